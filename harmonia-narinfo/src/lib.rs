// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: EUPL-1.2 OR MIT

//! The `.narinfo` metadata record served by binary caches next to a NAR.
//!
//! A narinfo is plain text with one `Key: value` line per field. Parsing
//! ignores keys it does not know; formatting always emits the fields in the
//! order Nix writes them.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::debug;

mod error;

pub use error::NarInfoError;

#[derive(Debug, Default, PartialEq, Eq, Clone, Serialize)]
pub struct NarInfo {
    pub store_path: String,
    /// Relative to the cache root.
    pub url: String,
    pub compression: String,
    pub file_hash: String,
    pub file_size: u64,
    pub nar_hash: String,
    pub nar_size: u64,
    pub references: Vec<String>,
    pub deriver: Option<String>,
    pub sigs: Vec<String>,
    pub ca: Option<String>,
}

fn parse_u64(key: &'static str, value: &str) -> Result<u64, NarInfoError> {
    value.parse().map_err(|source| NarInfoError::InvalidInteger {
        key,
        value: value.to_owned(),
        source,
    })
}

impl NarInfo {
    pub fn parse(text: &str) -> Result<NarInfo, NarInfoError> {
        let mut info = NarInfo::default();
        for line in text.lines() {
            if line.is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once(": ")
                .ok_or_else(|| NarInfoError::InvalidLine {
                    line: line.to_owned(),
                })?;
            match key {
                "StorePath" => info.store_path = value.to_owned(),
                "URL" => info.url = value.to_owned(),
                "Compression" => info.compression = value.to_owned(),
                "FileHash" => info.file_hash = value.to_owned(),
                "FileSize" => info.file_size = parse_u64("FileSize", value)?,
                "NarHash" => info.nar_hash = value.to_owned(),
                "NarSize" => info.nar_size = parse_u64("NarSize", value)?,
                "References" => info.references.extend(
                    value
                        .split(' ')
                        .filter(|r| !r.is_empty())
                        .map(str::to_owned),
                ),
                "Deriver" => info.deriver = Some(value.to_owned()),
                "Sig" => info.sigs.push(value.to_owned()),
                "CA" => info.ca = Some(value.to_owned()),
                _ => debug!("Ignoring unknown narinfo key {key}"),
            }
        }
        Ok(info)
    }
}

impl FromStr for NarInfo {
    type Err = NarInfoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NarInfo::parse(s)
    }
}

/// Helper macro for adding lines to narinfo
macro_rules! push_line {
    ($f:expr, $prefix:literal, $value:expr) => {
        writeln!($f, concat!($prefix, "{}"), $value)?
    };
}

impl fmt::Display for NarInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        push_line!(f, "StorePath: ", self.store_path);
        push_line!(f, "URL: ", self.url);
        push_line!(f, "Compression: ", self.compression);
        push_line!(f, "FileHash: ", self.file_hash);
        push_line!(f, "FileSize: ", self.file_size);
        push_line!(f, "NarHash: ", self.nar_hash);
        push_line!(f, "NarSize: ", self.nar_size);

        // Always present, even without references
        f.write_str("References:")?;
        if self.references.is_empty() {
            f.write_str(" ")?;
        }
        for r in &self.references {
            write!(f, " {r}")?;
        }
        f.write_str("\n")?;

        if let Some(drv) = &self.deriver {
            push_line!(f, "Deriver: ", drv);
        }
        for sig in &self.sigs {
            push_line!(f, "Sig: ", sig);
        }
        if let Some(ca) = &self.ca {
            push_line!(f, "CA: ", ca);
        }
        Ok(())
    }
}


#[cfg(test)]
mod proptests {
    use proptest::collection::vec;
    use proptest::option;
    use proptest::prelude::*;

    use super::*;

    fn arb_value() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9:/.+=_-]{0,40}"
    }

    prop_compose! {
        fn arb_narinfo()(
            store_path in arb_value(),
            url in arb_value(),
            compression in arb_value(),
            file_hash in arb_value(),
            file_size in any::<u64>(),
            nar_hash in arb_value(),
            nar_size in any::<u64>(),
            references in vec("[a-z0-9.-]{1,20}", 0..5),
            deriver in option::of(arb_value()),
            sigs in vec(arb_value(), 0..3),
            ca in option::of(arb_value()),
        ) -> NarInfo {
            NarInfo {
                store_path,
                url,
                compression,
                file_hash,
                file_size,
                nar_hash,
                nar_size,
                references,
                deriver,
                sigs,
                ca,
            }
        }
    }

    proptest! {
        #[test]
        fn proptest_display_parse(info in arb_narinfo()) {
            let parsed = NarInfo::parse(&info.to_string()).unwrap();
            prop_assert_eq!(parsed, info);
        }
    }
}
