use crate::utils::error::{GeoExportError, Result};
use std::collections::HashSet;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field_name: &str, value: &str, reason: impl Into<String>) -> GeoExportError {
    GeoExportError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Access token 以 Bearer 送出，只允許 https；本機測試伺服器可用 http
pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(invalid(field_name, url_str, "URL cannot be empty"));
    }

    let url = Url::parse(url_str)
        .map_err(|e| invalid(field_name, url_str, format!("Invalid URL format: {}", e)))?;

    let loopback = matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));
    match url.scheme() {
        "https" => Ok(()),
        "http" if loopback => Ok(()),
        "http" => Err(invalid(
            field_name,
            url_str,
            "Plain http is only allowed for localhost; the access token would be sent unencrypted",
        )),
        scheme => Err(invalid(
            field_name,
            url_str,
            format!("Unsupported URL scheme: {}", scheme),
        )),
    }
}

/// `extensions` 為空時不檢查副檔名；比對不分大小寫
pub fn validate_path(field_name: &str, path: &str, extensions: &[&str]) -> Result<()> {
    if path.trim().is_empty() {
        return Err(invalid(field_name, path, "Path cannot be empty"));
    }
    if path.contains('\0') {
        return Err(invalid(field_name, path, "Path contains null bytes"));
    }
    if extensions.is_empty() {
        return Ok(());
    }

    let extension = std::path::Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension {
        Some(ext) if extensions.contains(&ext.as_str()) => Ok(()),
        _ => Err(invalid(
            field_name,
            path,
            format!("Expected a .{} file", extensions.join(" / .")),
        )),
    }
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(GeoExportError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(GeoExportError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// Earth Engine 的 collection id 形如 `MODIS/061/MCD64A1`
pub fn validate_asset_id(field_name: &str, asset_id: &str) -> Result<()> {
    validate_non_empty_string(field_name, asset_id)?;

    if asset_id.starts_with('/') || asset_id.ends_with('/') || asset_id.contains("//") {
        return Err(GeoExportError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: asset_id.to_string(),
            reason: "Asset id must be slash-separated path segments".to_string(),
        });
    }

    if asset_id.chars().any(char::is_whitespace) {
        return Err(GeoExportError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: asset_id.to_string(),
            reason: "Asset id cannot contain whitespace".to_string(),
        });
    }

    Ok(())
}

/// 所有 description 必須唯一，否則 Drive 上的檔案會互相覆蓋
pub fn validate_unique<'a, I>(field_name: &str, values: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    for value in values {
        if !seen.insert(value) {
            return Err(GeoExportError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: value.to_string(),
                reason: "Value must be unique".to_string(),
            });
        }
    }
    Ok(())
}
