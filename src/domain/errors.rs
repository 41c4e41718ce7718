use std::fmt;

// Domain-level errors for room workflows.

/// Rejected join payloads. The message is sent back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyName,
    NameLength { min: usize, max: usize },
    NameCharset,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyName => write!(f, "player name is required"),
            ValidationError::NameLength { min, max } => {
                write!(f, "player name must be {min}-{max} characters")
            }
            ValidationError::NameCharset => write!(
                f,
                "player name may only contain letters, digits, underscores and spaces"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    Validation(ValidationError),
    RoomFull,
    AlreadyInRoom,
    UnknownPlayer,
}

impl From<ValidationError> for RoomError {
    fn from(e: ValidationError) -> Self {
        RoomError::Validation(e)
    }
}

impl fmt::Display for RoomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomError::Validation(e) => e.fmt(f),
            RoomError::RoomFull => write!(f, "room is full"),
            RoomError::AlreadyInRoom => write!(f, "player is already in the room"),
            RoomError::UnknownPlayer => write!(f, "player is not in the room"),
        }
    }
}
