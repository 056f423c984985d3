use thiserror::Error;

pub type Result<T> = std::result::Result<T, SimulationError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("year {year} appears more than once")]
    DuplicateYear { year: i32 },

    #[error("return series years must be increasing: {year} follows {previous}")]
    UnorderedYears { previous: i32, year: i32 },

    #[error("return for year {year} is not a finite number")]
    NonFiniteReturn { year: i32 },

    #[error("invalid entry '{entry}': expected YEAR:VALUE")]
    InvalidYearEntry { entry: String },

    #[error("start year {start} must be <= end year {end}")]
    InvalidYearRange { start: i32, end: i32 },

    #[error("unknown return index '{index}'")]
    UnknownIndex { index: String },

    #[error("failed to serialize result: {message}")]
    Serialization { message: String },
}
