//! Submitted forms, decoded field by field from the url-encoded body.
//!
//! Each form owns a `Validator` so a failed submission can be re-rendered with the values
//! the user typed and the messages for each field.

use std::collections::HashMap;

use crate::errors::AppError;
use crate::validator::{EMAIL_RX, Validator, matches, max_chars, min_chars, not_blank, permitted_value};

pub type FormFields = HashMap<String, String>;

const BLANK: &str = "This field cannot be blank";
const PERMITTED_EXPIRES: [i32; 3] = [1, 7, 365];
const MIN_PASSWORD_CHARS: usize = 8;

fn text(fields: &FormFields, key: &str) -> String {
    fields.get(key).cloned().unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetCreateForm {
    pub title: String,
    pub content: String,
    pub expires: i32,
    pub validator: Validator,
}

impl Default for SnippetCreateForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            content: String::new(),
            expires: 365,
            validator: Validator::new(),
        }
    }
}

impl SnippetCreateForm {
    /// A non-numeric `expires` cannot be shown back to the user, so it is a 400 rather
    /// than a field error.
    pub fn decode(fields: &FormFields) -> Result<Self, AppError> {
        let expires = text(fields, "expires")
            .trim()
            .parse::<i32>()
            .map_err(|_| AppError::bad_request())?;

        Ok(Self {
            title: text(fields, "title"),
            content: text(fields, "content"),
            expires,
            validator: Validator::new(),
        })
    }

    pub fn validate(&mut self) -> bool {
        let v = &mut self.validator;
        v.check_field(not_blank(&self.title), "title", BLANK);
        v.check_field(
            max_chars(&self.title, 100),
            "title",
            "This field cannot be more than 100 characters long",
        );
        v.check_field(not_blank(&self.content), "content", BLANK);
        v.check_field(
            permitted_value(&self.expires, &PERMITTED_EXPIRES),
            "expires",
            "This field must equal 1, 7 or 365",
        );
        v.valid()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserSignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub validator: Validator,
}

impl UserSignupForm {
    pub fn decode(fields: &FormFields) -> Self {
        Self {
            name: text(fields, "name"),
            email: text(fields, "email"),
            password: text(fields, "password"),
            validator: Validator::new(),
        }
    }

    pub fn validate(&mut self) -> bool {
        let v = &mut self.validator;
        v.check_field(not_blank(&self.name), "name", BLANK);
        v.check_field(not_blank(&self.email), "email", BLANK);
        v.check_field(
            matches(&self.email, &EMAIL_RX),
            "email",
            "This field must be a valid email address",
        );
        v.check_field(not_blank(&self.password), "password", BLANK);
        v.check_field(
            min_chars(&self.password, MIN_PASSWORD_CHARS),
            "password",
            "This field must be at least 8 characters long",
        );
        v.valid()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserLoginForm {
    pub email: String,
    pub password: String,
    pub validator: Validator,
}

impl UserLoginForm {
    pub fn decode(fields: &FormFields) -> Self {
        Self {
            email: text(fields, "email"),
            password: text(fields, "password"),
            validator: Validator::new(),
        }
    }

    pub fn validate(&mut self) -> bool {
        let v = &mut self.validator;
        v.check_field(not_blank(&self.email), "email", BLANK);
        v.check_field(
            matches(&self.email, &EMAIL_RX),
            "email",
            "This field must be a valid email address",
        );
        v.check_field(not_blank(&self.password), "password", BLANK);
        v.valid()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountPasswordUpdateForm {
    pub current_password: String,
    pub new_password: String,
    pub new_password_confirmation: String,
    pub validator: Validator,
}

impl AccountPasswordUpdateForm {
    pub fn decode(fields: &FormFields) -> Self {
        Self {
            current_password: text(fields, "currentPassword"),
            new_password: text(fields, "newPassword"),
            new_password_confirmation: text(fields, "newPasswordConfirmation"),
            validator: Validator::new(),
        }
    }

    pub fn validate(&mut self) -> bool {
        let v = &mut self.validator;
        v.check_field(not_blank(&self.current_password), "currentPassword", BLANK);
        v.check_field(not_blank(&self.new_password), "newPassword", BLANK);
        v.check_field(
            min_chars(&self.new_password, MIN_PASSWORD_CHARS),
            "newPassword",
            "This field must be at least 8 characters long",
        );
        v.check_field(
            not_blank(&self.new_password_confirmation),
            "newPasswordConfirmation",
            BLANK,
        );
        v.check_field(
            self.new_password == self.new_password_confirmation,
            "newPasswordConfirmation",
            "Passwords do not match",
        );
        v.valid()
    }
}
