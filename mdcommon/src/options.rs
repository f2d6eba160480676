/// Sampling controls forwarded to the model. `None` leaves the provider's
/// default in place.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

impl GenerationOptions {
    pub fn with_temperature(self, temperature: f32) -> Self {
        Self {
            temperature: Some(temperature),
            ..self
        }
    }

    pub fn with_max_tokens(self, max_tokens: u32) -> Self {
        Self {
            max_tokens: Some(max_tokens),
            ..self
        }
    }

    pub fn with_streaming(self, stream: bool) -> Self {
        Self { stream, ..self }
    }

    pub fn enable_streaming(self) -> Self {
        self.with_streaming(true)
    }
}
