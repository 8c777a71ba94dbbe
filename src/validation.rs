use snafu::{ensure, Location, Snafu};

pub type Result<T, E = ValidationError> = std::result::Result<T, E>;

/// Rejections raised before anything touches the storage layer.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ValidationError {
    #[snafu(display("field `{field}` is required"))]
    MissingField {
        field: &'static str,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("field `{field}` must not be negative, got {value}"))]
    NegativeId {
        field: &'static str,
        value: i64,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("`{field}` must be a positive integer"))]
    NotPositive {
        field: &'static str,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("`{field}` must be at most {max}, got {value}"))]
    TooLarge {
        field: &'static str,
        value: u64,
        max: u64,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("`{name}` is not a valid table or column family name"))]
    InvalidName {
        name: String,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Largest value an integer column can hold.
pub const MAX_STORED: u64 = i64::MAX as u64;

pub fn storable(field: &'static str, value: u64) -> Result<u64> {
    ensure!(
        value <= MAX_STORED,
        TooLargeSnafu {
            field,
            value,
            max: MAX_STORED
        }
    );
    Ok(value)
}

/// Accepts `[A-Za-z_][A-Za-z0-9_]*`, the names every storage engine here can take verbatim.
pub fn identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    ensure!(
        head_ok && tail_ok,
        InvalidNameSnafu {
            name: name.to_owned()
        }
    );
    Ok(())
}
