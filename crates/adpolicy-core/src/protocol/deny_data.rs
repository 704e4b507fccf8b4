//! Deny-data binary file parsing (panic-free).
//!
//! Layout (little-endian):
//!
//! ```text
//! u8   version                 (must be 1)
//! u32  entry_count
//!   u16 name_len, name         (UTF-8)
//!   u8  package_type           (0 unknown, 1 app, 2 sdk)
//!   u16 range_count
//!     u64 min_version
//!     u64 max_version          (0 = unbounded)
//!     u16 group_count
//!       u16 len, group         (UTF-8)
//! ```
//!
//! Parsing rules:
//! - Never index (`buf[0]`); read through `Buf` after a `remaining()` check.
//! - Never `unwrap()` / `expect()` / `panic!()` in production paths.

use std::collections::BTreeMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{AdPolicyError, Result};

/// Current deny-data format version.
pub const DENY_DATA_VERSION: u8 = 1;

/// Kind of identifier a deny entry applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageType {
    Unknown,
    App,
    Sdk,
}

impl PackageType {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => PackageType::App,
            2 => PackageType::Sdk,
            _ => PackageType::Unknown,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            PackageType::Unknown => 0,
            PackageType::App => 1,
            PackageType::Sdk => 2,
        }
    }
}

/// API groups denied for a range of package versions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApiDenyGroupsForPackageVersions {
    pub min_version: u64,
    /// `0` means no upper bound.
    pub max_version: u64,
    pub api_groups: Vec<String>,
}

impl ApiDenyGroupsForPackageVersions {
    /// Whether `version` falls inside this range (bounds inclusive).
    pub fn contains_version(&self, version: u64) -> bool {
        let max = if self.max_version > 0 { self.max_version } else { u64::MAX };
        version >= self.min_version && version <= max
    }
}

/// All deny ranges declared for one package or SDK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiDenyGroupsForPackage {
    pub package_type: PackageType,
    pub versions: Vec<ApiDenyGroupsForPackageVersions>,
}

/// Decoded deny-data file: identifier -> deny declaration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackageToApiDenyGroupsMap {
    pub entries: BTreeMap<String, ApiDenyGroupsForPackage>,
}

/// Decode a deny-data file from bytes.
pub fn decode_deny_data(mut buf: Bytes) -> Result<PackageToApiDenyGroupsMap> {
    if buf.remaining() < 5 {
        return Err(AdPolicyError::BadRequest("deny data too short".into()));
    }

    let v = buf.get_u8();
    if v != DENY_DATA_VERSION {
        return Err(AdPolicyError::UnsupportedVersion);
    }

    let entry_count = buf.get_u32_le();
    let mut entries = BTreeMap::new();

    for _ in 0..entry_count {
        let name = read_str(&mut buf, "entry name")?;
        let package_type = PackageType::from_u8(read_u8(&mut buf, "package type")?);

        let range_count = read_u16(&mut buf, "range count")?;
        let mut versions = Vec::with_capacity(range_count as usize);
        for _ in 0..range_count {
            if buf.remaining() < 16 {
                return Err(AdPolicyError::BadRequest(format!(
                    "version range truncated for {name}"
                )));
            }
            let min_version = buf.get_u64_le();
            let max_version = buf.get_u64_le();

            let group_count = read_u16(&mut buf, "group count")?;
            let mut api_groups = Vec::with_capacity(group_count as usize);
            for _ in 0..group_count {
                api_groups.push(read_str(&mut buf, "api group")?);
            }

            versions.push(ApiDenyGroupsForPackageVersions {
                min_version,
                max_version,
                api_groups,
            });
        }

        if entries
            .insert(name.clone(), ApiDenyGroupsForPackage { package_type, versions })
            .is_some()
        {
            return Err(AdPolicyError::BadRequest(format!("duplicate entry: {name}")));
        }
    }

    if buf.has_remaining() {
        return Err(AdPolicyError::BadRequest(format!(
            "{} trailing bytes after deny data",
            buf.remaining()
        )));
    }

    Ok(PackageToApiDenyGroupsMap { entries })
}

/// Encode a deny-data map using the current format version.
pub fn encode_deny_data(map: &PackageToApiDenyGroupsMap) -> Result<Bytes> {
    let mut out = BytesMut::new();
    out.put_u8(DENY_DATA_VERSION);
    out.put_u32_le(len_u32(map.entries.len(), "entry count")?);

    for (name, entry) in &map.entries {
        write_str(&mut out, name)?;
        out.put_u8(entry.package_type.as_u8());
        out.put_u16_le(len_u16(entry.versions.len(), "range count")?);
        for range in &entry.versions {
            out.put_u64_le(range.min_version);
            out.put_u64_le(range.max_version);
            out.put_u16_le(len_u16(range.api_groups.len(), "group count")?);
            for group in &range.api_groups {
                write_str(&mut out, group)?;
            }
        }
    }

    Ok(out.freeze())
}

fn read_u8(buf: &mut Bytes, what: &str) -> Result<u8> {
    if buf.remaining() < 1 {
        return Err(AdPolicyError::BadRequest(format!("missing {what}")));
    }
    Ok(buf.get_u8())
}

fn read_u16(buf: &mut Bytes, what: &str) -> Result<u16> {
    if buf.remaining() < 2 {
        return Err(AdPolicyError::BadRequest(format!("missing {what}")));
    }
    Ok(buf.get_u16_le())
}

fn read_str(buf: &mut Bytes, what: &str) -> Result<String> {
    let len = read_u16(buf, what)? as usize;
    if buf.remaining() < len {
        return Err(AdPolicyError::BadRequest(format!("{what} truncated")));
    }
    let raw = buf.copy_to_bytes(len);
    String::from_utf8(raw.to_vec())
        .map_err(|_| AdPolicyError::BadRequest(format!("{what} is not utf-8")))
}

fn write_str(out: &mut BytesMut, s: &str) -> Result<()> {
    out.put_u16_le(len_u16(s.len(), "string length")?);
    out.put_slice(s.as_bytes());
    Ok(())
}

fn len_u16(len: usize, what: &str) -> Result<u16> {
    u16::try_from(len).map_err(|_| AdPolicyError::BadRequest(format!("{what} exceeds u16")))
}

fn len_u32(len: usize, what: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| AdPolicyError::BadRequest(format!("{what} exceeds u32")))
}
