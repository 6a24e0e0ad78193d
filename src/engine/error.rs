use std::fmt;

use crate::store::StoreError;

/// Request field a validation message is keyed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    CheckInDate,
    CheckOutDate,
    GuestCount,
}

impl Field {
    /// Name as it appears in the request contract.
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::CheckInDate => "checkInDate",
            Field::CheckOutDate => "checkOutDate",
            Field::GuestCount => "guestCount",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub message: &'static str,
}

/// Every rule a search request broke, in rule order. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub(super) fn from_vec(errors: Vec<FieldError>) -> Option<Self> {
        (!errors.is_empty()).then_some(Self(errors))
    }

    pub(super) fn single(field: Field, message: &'static str) -> Self {
        Self(vec![FieldError { field, message }])
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn for_field(&self, field: Field) -> impl Iterator<Item = &'static str> + '_ {
        self.0
            .iter()
            .filter(move |e| e.field == field)
            .map(|e| e.message)
    }

    pub fn has(&self, field: Field) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", e.field, e.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

#[derive(Debug)]
pub enum EngineError {
    /// The caller can fix the request and try again.
    Validation(ValidationErrors),
    /// The repository failed; not something the caller's input can fix.
    DataAccess(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::DataAccess(e)
    }
}

impl From<ValidationErrors> for EngineError {
    fn from(e: ValidationErrors) -> Self {
        EngineError::Validation(e)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Validation(errors) => write!(f, "invalid search: {errors}"),
            EngineError::DataAccess(e) => write!(f, "data access failed: {e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Validation(errors) => Some(errors),
            EngineError::DataAccess(e) => Some(e),
        }
    }
}
