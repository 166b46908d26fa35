//! # Validation Module
//!
//! Join guards and input validation for Waitline.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Join Validation Layers                             │
//! │                                                                         │
//! │  Layer 1: HTTP wrapper                                                 │
//! │  └── Type validation (deserialization)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── validate_customer      (required fields, contact formats)         │
//! │  └── check_join             (active flag, date window, party size)     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Entry Store (SQLite)                                         │
//! │  └── Partial UNIQUE index: one open entry per customer per day         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{ChannelKind, CustomerProfile, QueueConfiguration};
use crate::{MAX_PARTY_SIZE, MAX_TOLERANCE_MINUTES};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 120;
const MAX_ID_LEN: usize = 64;

// =============================================================================
// Customer Validators
// =============================================================================

/// Validates the customer profile supplied at join time.
///
/// ## Rules
/// - `customer_id` and `display_name` are required
/// - `phone`, when present, is `+` followed by 8-15 digits
/// - `email`, when present, has a single `@` with text on both sides
/// - a preferred channel must have the matching contact field
///
/// ## Example
/// ```rust
/// use waitline_core::validation::validate_customer;
/// use waitline_core::CustomerProfile;
///
/// let profile = CustomerProfile {
///     customer_id: "c-42".into(),
///     display_name: "Ada".into(),
///     phone: Some("+5511999990000".into()),
///     email: None,
///     preferred_channel: None,
/// };
/// assert!(validate_customer(&profile).is_ok());
/// ```
pub fn validate_customer(profile: &CustomerProfile) -> ValidationResult<()> {
    validate_identifier("customer_id", &profile.customer_id)?;

    let name = profile.display_name.trim();
    if name.is_empty() {
        return Err(ValidationError::required("display_name"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "display_name".to_string(),
            max: MAX_NAME_LEN,
        });
    }

    if let Some(phone) = &profile.phone {
        validate_phone(phone)?;
    }
    if let Some(email) = &profile.email {
        validate_email(email)?;
    }

    if let Some(channel) = profile.preferred_channel {
        validate_contact_for(channel, profile.phone.as_deref(), profile.email.as_deref())?;
    }

    Ok(())
}

/// Validates an opaque identifier (company, queue, customer).
pub fn validate_identifier(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::required(field));
    }
    if value.len() > MAX_ID_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_ID_LEN,
        });
    }
    Ok(())
}

/// Validates a phone number in E.164 form.
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let digits = phone
        .strip_prefix('+')
        .ok_or_else(|| ValidationError::invalid_format("phone", "must start with '+'"))?;

    if !(8..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::invalid_format(
            "phone",
            "must contain 8 to 15 digits after '+'",
        ));
    }

    Ok(())
}

/// Validates an e-mail address (shape only).
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let mut parts = email.trim().split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None)
            if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') =>
        {
            Ok(())
        }
        _ => Err(ValidationError::invalid_format(
            "email",
            "must look like name@example.com",
        )),
    }
}

/// Checks that the contact field required by `channel` is present.
pub fn validate_contact_for(
    channel: ChannelKind,
    phone: Option<&str>,
    email: Option<&str>,
) -> ValidationResult<()> {
    match channel {
        ChannelKind::Sms | ChannelKind::ChatTemplate if phone.is_none() => {
            Err(ValidationError::required("phone"))
        }
        ChannelKind::Email if email.is_none() => Err(ValidationError::required("email")),
        _ => Ok(()),
    }
}

// =============================================================================
// Join Guards
// =============================================================================

/// Applies the configuration guards of the join operation.
///
/// ## Order
/// ```text
/// is_active?           no → QueueInactive
/// date in window?      no → OutOfWindow
/// min ≤ party ≤ max?   no → PartySizeOutOfRange
/// ```
/// The duplicate-today guard needs the Entry Store and lives in the engine.
pub fn check_join(config: &QueueConfiguration, date: NaiveDate, party_size: i64) -> CoreResult<()> {
    if !config.is_active {
        return Err(CoreError::QueueInactive {
            queue_id: config.queue_id.clone(),
        });
    }

    if !config.is_open_on(date) {
        return Err(CoreError::OutOfWindow {
            queue_id: config.queue_id.clone(),
            date,
        });
    }

    if party_size < config.min_party_size || party_size > config.max_party_size {
        return Err(CoreError::PartySizeOutOfRange {
            requested: party_size,
            min: config.min_party_size,
            max: config.max_party_size,
        });
    }

    Ok(())
}

// =============================================================================
// Configuration Validators
// =============================================================================

/// Validates a queue configuration before it is stored.
pub fn validate_configuration(config: &QueueConfiguration) -> ValidationResult<()> {
    validate_identifier("company_id", &config.company_id)?;
    validate_identifier("queue_id", &config.queue_id)?;

    if !(1..=MAX_TOLERANCE_MINUTES).contains(&config.tolerance_minutes) {
        return Err(ValidationError::OutOfRange {
            field: "tolerance_minutes".to_string(),
            min: 1,
            max: MAX_TOLERANCE_MINUTES,
        });
    }

    if config.min_party_size < 1 || config.max_party_size > MAX_PARTY_SIZE {
        return Err(ValidationError::OutOfRange {
            field: "party_size".to_string(),
            min: 1,
            max: MAX_PARTY_SIZE,
        });
    }

    if config.min_party_size > config.max_party_size {
        return Err(ValidationError::invalid_format(
            "party_size",
            "min_party_size exceeds max_party_size",
        ));
    }

    if let (Some(from), Some(until)) = (config.active_from, config.active_until) {
        if from > until {
            return Err(ValidationError::invalid_format(
                "active_from",
                "window starts after it ends",
            ));
        }
    }

    if config.average_service_minutes < 0 {
        return Err(ValidationError::OutOfRange {
            field: "average_service_minutes".to_string(),
            min: 0,
            max: MAX_TOLERANCE_MINUTES,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
