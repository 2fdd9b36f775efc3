//! Registration form and its validation rules

use serde::{Deserialize, Serialize};

use super::identity::normalize_email;
use super::result::{Result, ValidationErrors};

/// Minimum password length, in characters
pub const MIN_PASSWORD_LEN: usize = 6;

pub const MSG_MISSING_FIELDS: &str = "Please fill in all fields";
pub const MSG_PASSWORD_MISMATCH: &str = "Passwords do not match";
pub const MSG_PASSWORD_TOO_SHORT: &str = "Password should be at least 6 characters";
pub const MSG_EMAIL_TAKEN: &str = "Email is already registered";

/// Fields submitted on the registration path
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct RegistrationForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegistrationForm {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        confirm_password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            confirm_password: confirm_password.into(),
        }
    }

    /// Run every rule and report all failures together
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();

        if self.name.trim().is_empty()
            || self.email.trim().is_empty()
            || self.password.is_empty()
            || self.confirm_password.is_empty()
        {
            errors.push(MSG_MISSING_FIELDS);
        }

        if self.password != self.confirm_password {
            errors.push(MSG_PASSWORD_MISMATCH);
        }

        if self.password.chars().count() < MIN_PASSWORD_LEN {
            errors.push(MSG_PASSWORD_TOO_SHORT);
        }

        errors.into_result()
    }

    pub fn normalized_email(&self) -> String {
        normalize_email(&self.email)
    }
}

impl std::fmt::Debug for RegistrationForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationForm")
            .field("name", &self.name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::result::Error;

    fn messages(form: &RegistrationForm) -> Vec<String> {
        match form.validate() {
            Ok(()) => Vec::new(),
            Err(Error::Validation(errors)) => errors.messages().to_vec(),
            Err(other) => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_valid_form() {
        let form = RegistrationForm::new("Ann", "A@x.com", "secret1", "secret1");
        assert!(form.validate().is_ok());
        assert_eq!(form.normalized_email(), "a@x.com");
    }

    #[test]
    fn test_all_failures_reported_in_order() {
        let form = RegistrationForm::new("", "a@x.com", "abc", "abd");
        assert_eq!(
            messages(&form),
            vec![MSG_MISSING_FIELDS, MSG_PASSWORD_MISMATCH, MSG_PASSWORD_TOO_SHORT]
        );
    }

    #[test]
    fn test_empty_form_reports_missing_and_short() {
        let form = RegistrationForm::default();
        assert_eq!(messages(&form), vec![MSG_MISSING_FIELDS, MSG_PASSWORD_TOO_SHORT]);
    }

    #[test]
    fn test_length_counts_characters() {
        // Six characters, more than six bytes
        let form = RegistrationForm::new("Zoë", "z@x.com", "éééééé", "éééééé");
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_debug_hides_passwords() {
        let form = RegistrationForm::new("Ann", "a@x.com", "hunter22", "hunter22");
        assert!(!format!("{:?}", form).contains("hunter22"));
    }
}
