use anyhow::{anyhow, Result};
use async_trait::async_trait;

/// Address component tag carrying the administrative region.
pub const COMPONENT_ADMINISTRATIVE_REGION: &str = "administrative_area_level_1";
/// Address component tag carrying the country.
pub const COMPONENT_COUNTRY: &str = "country";

/// One structured address component from the autocomplete provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressComponent {
    pub long_name: String,
    pub types: Vec<String>,
}

/// A resolved selection delivered by the places-autocomplete provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceSelection {
    pub name: Option<String>,
    pub address_components: Vec<AddressComponent>,
    /// Latitude/longitude from the provider's geometry, when present.
    pub location: Option<(f64, f64)>,
}

impl PlaceSelection {
    pub fn component(&self, tag: &str) -> Option<&str> {
        self.address_components
            .iter()
            .find(|component| component.types.iter().any(|t| t == tag))
            .map(|component| component.long_name.as_str())
    }
}

/// Places-autocomplete provider bound to one input element instance.
///
/// The provider attaches listeners to a concrete element, so the binding
/// must be re-established whenever the input remounts; `generation`
/// identifies the element instance being bound.
#[async_trait]
pub trait SuggestionProvider: Send + Sync {
    async fn bind(&self, generation: u64) -> Result<()>;
    async fn unbind(&self) -> Result<()>;
}

pub struct MissingSuggestionProvider;

#[async_trait]
impl SuggestionProvider for MissingSuggestionProvider {
    async fn bind(&self, _generation: u64) -> Result<()> {
        Err(anyhow!("no autocomplete provider configured"))
    }

    async fn unbind(&self) -> Result<()> {
        Ok(())
    }
}
