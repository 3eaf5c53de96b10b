/// Router Module Index
///
/// Splits the application's page routes by the middleware group they run behind. Both
/// groups sit under the dynamic pipeline (session, CSRF, authentication); the protected
/// group additionally passes the authorization gate.

/// Pages open to anonymous and signed-in users alike.
pub mod public;

/// Pages that require a signed-in user.
pub mod protected;
