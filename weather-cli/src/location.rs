use async_trait::async_trait;
use inquire::{CustomType, InquireError};
use weather_core::{
    Coordinates, LocationSource,
    location::{PositionError, PositionErrorCode, PositionOptions},
};

/// Asks the user for a position on the terminal. Dismissing the prompt
/// (Esc / Ctrl-C) counts as refusing location access.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptLocation;

#[async_trait]
impl LocationSource for PromptLocation {
    async fn current_position(&self, _: &PositionOptions) -> Result<Coordinates, PositionError> {
        let answer = tokio::task::spawn_blocking(prompt_coordinates)
            .await
            .map_err(|e| PositionError::new(PositionErrorCode::Other(0), e.to_string()))?;

        answer.map_err(|e| PositionError::new(error_code(&e), e.to_string()))
    }

    // The prompt owns the terminal until answered; cutting it off would
    // leave it reading stdin behind the next prompt.
    fn enforces_timeout(&self) -> bool {
        false
    }
}

fn prompt_coordinates() -> Result<Coordinates, InquireError> {
    let latitude = CustomType::<f64>::new("Latitude:")
        .with_help_message("Decimal degrees, -90 to 90")
        .with_validator(|v: &f64| Ok(range_check(*v, 90.0)))
        .prompt()?;
    let longitude = CustomType::<f64>::new("Longitude:")
        .with_help_message("Decimal degrees, -180 to 180")
        .with_validator(|v: &f64| Ok(range_check(*v, 180.0)))
        .prompt()?;

    Ok(Coordinates::new(latitude, longitude))
}

fn range_check(value: f64, limit: f64) -> inquire::validator::Validation {
    use inquire::validator::Validation;

    if (-limit..=limit).contains(&value) {
        Validation::Valid
    } else {
        Validation::Invalid(format!("must be between -{limit} and {limit}").into())
    }
}

fn error_code(err: &InquireError) -> PositionErrorCode {
    match err {
        InquireError::OperationCanceled | InquireError::OperationInterrupted => {
            PositionErrorCode::PermissionDenied
        }
        InquireError::NotTTY => PositionErrorCode::PositionUnavailable,
        _ => PositionErrorCode::Other(0),
    }
}
