// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::Serialize;

use crate::ListPatch;

pub const USERNAME_MIN_CHARS: usize = 3;
pub const USERNAME_MAX_CHARS: usize = 30;

/// Normalizes a title typed into the "create new list" input.
///
/// Returns `None` for blank input; blank creates are dropped without a request.
pub fn normalize_list_title(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

pub fn validate_list_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        bail!("list title is required -- enter a title and retry");
    }
    Ok(())
}

impl ListPatch {
    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            validate_list_title(title)?;
        }
        Ok(())
    }
}

/// Checkbox that distinguishes "never touched" from an explicit choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Checkbox {
    #[default]
    Untouched,
    Checked,
    Unchecked,
}

impl Checkbox {
    pub fn toggle(self) -> Self {
        match self {
            Self::Untouched | Self::Unchecked => Self::Checked,
            Self::Checked => Self::Unchecked,
        }
    }

    pub const fn is_checked(self) -> bool {
        matches!(self, Self::Checked)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    Username,
    Password,
    ToColl,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub remember_me: Checkbox,
    pub move_temp: bool,
    pub to_coll: String,
}

/// What the sign-in collaborator receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginPayload {
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remember_me: Option<String>,
    #[serde(rename = "moveTemp")]
    pub move_temp: bool,
    #[serde(rename = "toColl", skip_serializing_if = "Option::is_none")]
    pub to_coll: Option<String>,
}

impl LoginForm {
    pub fn set_text(&mut self, field: LoginField, value: impl Into<String>) {
        let value = value.into();
        match field {
            LoginField::Username => self.username = value,
            LoginField::Password => self.password = value,
            LoginField::ToColl => self.to_coll = value,
        }
    }

    pub fn toggle_remember_me(&mut self) {
        self.remember_me = self.remember_me.toggle();
    }

    pub fn toggle_move_temp(&mut self) {
        self.move_temp = !self.move_temp;
    }

    /// Soft warning shown next to the username input; never blocks submission.
    pub fn username_warning(&self) -> Option<&'static str> {
        if self.username.is_empty() || is_valid_username(&self.username) {
            None
        } else {
            Some("This is not a valid username.")
        }
    }

    pub fn submit(&self) -> Result<LoginPayload> {
        if self.username.trim().is_empty() {
            bail!("username is required -- enter your username and retry");
        }
        if self.password.is_empty() {
            bail!("password is required -- enter your password and retry");
        }
        let to_coll = if self.move_temp {
            let target = self.to_coll.trim();
            if target.is_empty() {
                bail!("choose a collection name to move temporary content into");
            }
            Some(target.to_owned())
        } else {
            None
        };

        let remember_me = match self.remember_me {
            Checkbox::Untouched => None,
            Checkbox::Checked => Some("1".to_owned()),
            Checkbox::Unchecked => Some("0".to_owned()),
        };

        Ok(LoginPayload {
            username: self.username.trim().to_owned(),
            password: self.password.clone(),
            remember_me,
            move_temp: self.move_temp,
            to_coll,
        })
    }
}

pub fn is_valid_username(value: &str) -> bool {
    let count = value.chars().count();
    if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&count) {
        return false;
    }
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    first.is_ascii_alphanumeric()
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::{
        Checkbox, LoginField, LoginForm, is_valid_username, normalize_list_title,
        validate_list_title,
    };
    use crate::ListPatch;

    #[test]
    fn blank_titles_normalize_to_none() {
        assert_eq!(normalize_list_title(""), None);
        assert_eq!(normalize_list_title("   \t"), None);
        assert_eq!(normalize_list_title("  Reading "), Some("Reading".to_owned()));
    }

    #[test]
    fn long_titles_are_not_capped() {
        assert!(validate_list_title(&"x".repeat(201)).is_ok());
        assert!(ListPatch::title("x".repeat(5000)).validate().is_ok());
    }

    #[test]
    fn patch_with_blank_title_is_rejected() {
        assert!(ListPatch::title("  ").validate().is_err());
        assert!(ListPatch::default().validate().is_ok());
    }

    #[test]
    fn username_pattern() {
        assert!(is_valid_username("alice"));
        assert!(is_valid_username("a_b-c9"));
        assert!(!is_valid_username("ab"));
        assert!(!is_valid_username("-alice"));
        assert!(!is_valid_username("al ice"));
    }

    #[test]
    fn username_warning_is_silent_for_empty_input() {
        let mut form = LoginForm::default();
        assert_eq!(form.username_warning(), None);
        form.set_text(LoginField::Username, "x!");
        assert!(form.username_warning().is_some());
    }

    #[test]
    fn remember_me_is_only_sent_once_touched() -> anyhow::Result<()> {
        let mut form = LoginForm::default();
        form.set_text(LoginField::Username, "alice");
        form.set_text(LoginField::Password, "hunter2");
        assert_eq!(form.submit()?.remember_me, None);

        form.toggle_remember_me();
        assert_eq!(form.remember_me, Checkbox::Checked);
        assert_eq!(form.submit()?.remember_me.as_deref(), Some("1"));

        form.toggle_remember_me();
        assert_eq!(form.submit()?.remember_me.as_deref(), Some("0"));
        Ok(())
    }

    #[test]
    fn move_temp_requires_target_collection() {
        let mut form = LoginForm::default();
        form.set_text(LoginField::Username, "alice");
        form.set_text(LoginField::Password, "hunter2");
        form.toggle_move_temp();

        let error = form.submit().expect_err("missing target should fail");
        assert!(error.to_string().contains("collection name"));

        form.set_text(LoginField::ToColl, " Imported ");
        let payload = form.submit().expect("target provided");
        assert!(payload.move_temp);
        assert_eq!(payload.to_coll.as_deref(), Some("Imported"));
    }

    #[test]
    fn missing_password_is_rejected() {
        let mut form = LoginForm::default();
        form.set_text(LoginField::Username, "alice");
        assert!(form.submit().is_err());
    }
}
