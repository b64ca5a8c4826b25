// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Form payloads and their validation rules.

use serde::Deserialize;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::AppError;
use crate::models::PartType;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginForm {
    #[validate(length(min = 1, message = "Username is required."))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required."))]
    pub password: String,
    /// Checkbox: present (usually `on`) when ticked.
    #[serde(default)]
    pub remember_me: Option<String>,
}

impl LoginForm {
    pub fn remember(&self) -> bool {
        matches!(
            self.remember_me.as_deref(),
            Some(v) if !v.is_empty() && v != "false" && v != "0"
        )
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegistrationForm {
    #[validate(
        length(min = 1, message = "Username is required."),
        custom(function = "validate_username_length")
    )]
    pub username: String,
    #[validate(email(message = "Invalid email address."))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required."))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords must match."))]
    pub password2: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddPartForm {
    #[validate(
        length(min = 1, message = "Part name is required."),
        custom(function = "validate_part_name_length")
    )]
    pub name: String,
    #[validate(custom(function = "validate_part_type"))]
    pub part_type: String,
    #[validate(
        custom(function = "validate_finite"),
        range(exclusive_min = 0.0, message = "Mileage limit must be positive.")
    )]
    pub mileage_limit: f64,
}

impl AddPartForm {
    /// Parsed part type; only meaningful after `validate` succeeded.
    pub fn part_type(&self) -> Result<PartType, AppError> {
        self.part_type
            .parse()
            .map_err(|_| AppError::validation("Not a valid part type."))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetLimitForm {
    #[validate(
        custom(function = "validate_finite"),
        range(exclusive_min = 0.0, message = "Wax limit must be positive.")
    )]
    pub wax_limit: f64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EditStartingForm {
    #[validate(
        custom(function = "validate_finite"),
        range(min = 0.0, message = "Starting mileage cannot be negative.")
    )]
    pub starting_mileage: f64,
}

/// Longest accepted username or part name, in characters.
pub const MAX_NAME_LEN: usize = 64;

fn validate_username_length(value: &str) -> Result<(), ValidationError> {
    if value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::new("length")
            .with_message("Username must be 64 characters or fewer.".into()));
    }
    Ok(())
}

fn validate_part_name_length(value: &str) -> Result<(), ValidationError> {
    if value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::new("length")
            .with_message("Part name must be 64 characters or fewer.".into()));
    }
    Ok(())
}

/// `range` lets infinities through; mileages must be real numbers.
fn validate_finite(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::new("finite").with_message("Must be a number.".into()));
    }
    Ok(())
}

fn validate_part_type(value: &str) -> Result<(), ValidationError> {
    value
        .parse::<PartType>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("part_type").with_message("Not a valid part type.".into()))
}

/// Run a form's validation rules, turning failures into user-facing messages.
pub fn validate_form<T: Validate>(form: &T) -> Result<(), AppError> {
    form.validate()
        .map_err(|errors| AppError::Validation(messages(&errors)))
}

/// Flatten validation errors into messages, sorted by field name.
fn messages(errors: &ValidationErrors) -> Vec<String> {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    fields
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(msg) => msg.to_string(),
                None => format!("Invalid value for {}.", field),
            })
        })
        .collect()
}
