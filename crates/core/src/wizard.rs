//! Booklet wizard step definitions and navigation rules.
//!
//! The editor walks the operator through ten content steps. Every autosave
//! scope belongs to exactly one step (see [`crate::patch::Scope::step`]);
//! the last step also hosts the publish action.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// The ten steps of the booklet wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Identity,
    PracticalInfo,
    Connectivity,
    Equipment,
    Cleaning,
    NearbyPlaces,
    Contacts,
    Faq,
    Legal,
    Appearance,
}

/// Total number of steps in the wizard.
pub const TOTAL_STEPS: u8 = 10;

/// Minimum step number (1-based).
pub const MIN_STEP: u8 = 1;

/// Maximum step number (1-based).
pub const MAX_STEP: u8 = 10;

impl WizardStep {
    /// Convert a 1-based step number to a `WizardStep`.
    pub fn from_number(n: u8) -> Result<Self, CoreError> {
        match n {
            1 => Ok(Self::Identity),
            2 => Ok(Self::PracticalInfo),
            3 => Ok(Self::Connectivity),
            4 => Ok(Self::Equipment),
            5 => Ok(Self::Cleaning),
            6 => Ok(Self::NearbyPlaces),
            7 => Ok(Self::Contacts),
            8 => Ok(Self::Faq),
            9 => Ok(Self::Legal),
            10 => Ok(Self::Appearance),
            _ => Err(CoreError::Validation(format!(
                "Invalid step number {n}. Must be between {MIN_STEP} and {MAX_STEP}"
            ))),
        }
    }

    /// Convert to a 1-based step number.
    pub fn to_number(self) -> u8 {
        match self {
            Self::Identity => 1,
            Self::PracticalInfo => 2,
            Self::Connectivity => 3,
            Self::Equipment => 4,
            Self::Cleaning => 5,
            Self::NearbyPlaces => 6,
            Self::Contacts => 7,
            Self::Faq => 8,
            Self::Legal => 9,
            Self::Appearance => 10,
        }
    }

    /// Human-readable label for the step.
    pub fn label(self) -> &'static str {
        match self {
            Self::Identity => "Welcome",
            Self::PracticalInfo => "Practical Info",
            Self::Connectivity => "Wi-Fi",
            Self::Equipment => "Equipment",
            Self::Cleaning => "Cleaning",
            Self::NearbyPlaces => "Nearby Places",
            Self::Contacts => "Contacts",
            Self::Faq => "FAQ",
            Self::Legal => "Legal",
            Self::Appearance => "Appearance",
        }
    }

    /// The step after this one, if any.
    pub fn next(self) -> Option<Self> {
        Self::from_number(self.to_number() + 1).ok()
    }

    /// The step before this one, if any.
    pub fn previous(self) -> Option<Self> {
        self.to_number()
            .checked_sub(1)
            .and_then(|n| Self::from_number(n).ok())
    }

    /// Whether this step hosts the publish action.
    pub fn is_terminal(self) -> bool {
        self.to_number() == MAX_STEP
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate that a step number is within the valid range.
pub fn validate_step_number(step: u8) -> Result<(), CoreError> {
    if !(MIN_STEP..=MAX_STEP).contains(&step) {
        return Err(CoreError::Validation(format!(
            "Step {step} is out of range ({MIN_STEP}..{MAX_STEP})"
        )));
    }
    Ok(())
}

/// Check that publishing is attempted from the terminal step.
pub fn can_publish_from(step: WizardStep) -> Result<(), CoreError> {
    if !step.is_terminal() {
        return Err(CoreError::Validation(format!(
            "Cannot publish from step {} ({}): publishing happens on step {MAX_STEP}",
            step.to_number(),
            step.label()
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
