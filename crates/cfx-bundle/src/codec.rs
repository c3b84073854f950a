use anyhow::{Context, Result};
use cfx_model::ConfigurationAreaProperties;

/// Textual form of a configuration bundle.
pub trait BundleCodec {
    /// File extension written by default, without the dot.
    fn extension(&self) -> &str;

    fn encode(&self, area: &ConfigurationAreaProperties) -> Result<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> Result<ConfigurationAreaProperties>;
}

/// Pretty-printed JSON with a trailing newline.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl BundleCodec for JsonCodec {
    fn extension(&self) -> &str {
        "json"
    }

    fn encode(&self, area: &ConfigurationAreaProperties) -> Result<Vec<u8>> {
        let json = serde_json::to_string_pretty(area)
            .with_context(|| format!("serialize bundle failed: {}", area.header.pid))?;
        Ok(format!("{json}\n").into_bytes())
    }

    fn decode(&self, bytes: &[u8]) -> Result<ConfigurationAreaProperties> {
        serde_json::from_slice(bytes).context("parse bundle json failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfx_model::{AspectProperties, DeclaredProperty, PropertyHeader};

    #[test]
    fn json_codec_reads_what_it_writes() {
        let mut area = ConfigurationAreaProperties::new(
            PropertyHeader::new("kv.test", "Test"),
            "authority.default",
        );
        area.objects.push(DeclaredProperty::Aspect(AspectProperties {
            header: PropertyHeader::new("asp.x", "X"),
        }));

        let bytes = JsonCodec.encode(&area).unwrap();
        assert!(bytes.ends_with(b"\n"));
        assert_eq!(JsonCodec.decode(&bytes).unwrap(), area);
    }

    #[test]
    fn malformed_input_is_an_error() {
        let err = JsonCodec.decode(b"{ not json").unwrap_err();
        assert!(err.to_string().contains("parse bundle json failed"));
    }
}
