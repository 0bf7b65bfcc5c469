//! Shared serialization/deserialization utilities for configuration

/// Helper module for Duration serialization as seconds
///
/// This module serializes `std::time::Duration` as a u64 representing seconds,
/// which is more human-readable in TOML configuration files.
pub mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serialize a Duration as seconds (u64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    /// Deserialize a Duration from seconds (u64)
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Unix permission bits, written as an octal string (`"0644"`)
///
/// Bare integers are accepted too and taken as already-decoded bits.
pub mod file_mode {
    use serde::{self, de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Octal(String),
        Bits(u32),
    }

    /// Serialize permission bits as a four digit octal string
    pub fn serialize<S>(mode: &u32, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{:04o}", mode))
    }

    /// Deserialize permission bits from an octal string or an integer
    pub fn deserialize<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Octal(s) => u32::from_str_radix(s.trim(), 8)
                .map_err(|_| de::Error::custom(format!("invalid file mode: {}", s))),
            Raw::Bits(bits) => Ok(bits),
        }
    }
}
