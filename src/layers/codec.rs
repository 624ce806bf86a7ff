//! Codec for the `layers` URL parameter.
//!
//! ```text
//! layers      := layerEntry (";" layerEntry)*
//! layerEntry  := (internalSpec | externalSpec) ("@" key "=" value)* ("," flag)? ("," flag)?
//! externalSpec:= "WMS|" url "|" name ("|" version)? | "WMTS|" url "|" id
//!              | "KML|" url | "GPX|" url
//! flag        := "f" | "t" | "" | opacity
//! ```
//!
//! Reserved characters inside ids, urls and values are percent-escaped so a
//! decoded list always re-encodes to the same string. Legacy double-pipe
//! entries (`KML||url`, `WMS||title||url||layers||version`, ...) are accepted
//! on read only; writing always produces the single-pipe form.

use crate::layers::base::{ImportedLayerDescriptor, LayerRef};
use crate::layers::manager::LayerList;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

/// Escaped in every component
const COMPONENT: &AsciiSet = &CONTROLS
    .add(b'%')
    .add(b';')
    .add(b',')
    .add(b'@')
    .add(b'|');

/// Attribute keys additionally cannot hold the key/value separator
const ATTRIBUTE_KEY: &AsciiSet = &COMPONENT.add(b'=');

/// Feature ids are joined with colons
const FEATURE_ID: &AsciiSet = &COMPONENT.add(b':');

pub const FEATURES_ATTRIBUTE: &str = "features";
pub const TIME_ATTRIBUTE: &str = "time";
/// Older permalinks name the timestamp `year`
pub const LEGACY_TIME_ATTRIBUTE: &str = "year";
pub const ADMIN_ID_ATTRIBUTE: &str = "adminId";

const LEGACY_EXTERNAL_PREFIXES: [&str; 4] = ["KML||", "GPX||", "WMS||", "WMTS||"];

/// Errors that can occur while decoding a single layer entry
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("empty layer entry")]
    EmptyEntry,
    #[error("layer entry has no id")]
    MissingLayerId,
    #[error("invalid external layer description: {0}")]
    InvalidExternal(String),
    #[error("invalid percent encoding in {0}")]
    InvalidEncoding(String),
}

/// Encodes a layer list into the `layers` parameter value
pub fn encode_layers(layers: &LayerList) -> String {
    layers
        .iter()
        .map(encode_layer)
        .collect::<Vec<_>>()
        .join(";")
}

/// Decodes the `layers` parameter; malformed entries are skipped
pub fn decode_layers(value: &str) -> LayerList {
    value
        .split(';')
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(|entry| match decode_layer_entry(entry) {
            Ok(layer) => Some(layer),
            Err(e) => {
                log::warn!("ignoring layer entry {:?}: {}", entry, e);
                None
            }
        })
        .collect()
}

/// Encodes one layer entry
pub fn encode_layer(layer: &LayerRef) -> String {
    let mut out = match &layer.descriptor {
        ImportedLayerDescriptor::InternalCatalogLayer { id } => escape(id, COMPONENT),
        ImportedLayerDescriptor::ExternalWms {
            base_url,
            layer_name,
            version,
        } => {
            let mut spec = format!(
                "WMS|{}|{}",
                escape(base_url, COMPONENT),
                escape(layer_name, COMPONENT)
            );
            if let Some(version) = version {
                spec.push('|');
                spec.push_str(&escape(version, COMPONENT));
            }
            spec
        }
        ImportedLayerDescriptor::ExternalWmts {
            capabilities_url,
            layer_id,
        } => format!(
            "WMTS|{}|{}",
            escape(capabilities_url, COMPONENT),
            escape(layer_id, COMPONENT)
        ),
        // the admin id never leaves memory
        ImportedLayerDescriptor::ExternalKml { url, .. } => {
            format!("KML|{}", escape(url, COMPONENT))
        }
        ImportedLayerDescriptor::ExternalGpx { url } => format!("GPX|{}", escape(url, COMPONENT)),
    };

    if let Some(timestamp) = &layer.timestamp {
        push_attribute(&mut out, TIME_ATTRIBUTE, &escape(timestamp, COMPONENT));
    }

    for (key, value) in &layer.custom_attributes {
        if is_reserved_attribute(key) {
            log::debug!("not encoding reserved attribute {} on {}", key, layer.id);
            continue;
        }
        push_attribute(
            &mut out,
            &escape(key, ATTRIBUTE_KEY),
            &escape(value, COMPONENT),
        );
    }

    if layer.has_selection() {
        let features = layer
            .selected_feature_ids
            .iter()
            .map(|id| escape(id, FEATURE_ID))
            .collect::<Vec<_>>()
            .join(":");
        push_attribute(&mut out, FEATURES_ATTRIBUTE, &features);
    }

    let opacity = layer.opacity();
    if !layer.visible || opacity != 1.0 {
        out.push(',');
        if !layer.visible {
            out.push('f');
        }
        if opacity != 1.0 {
            out.push(',');
            out.push_str(&format!("{}", opacity));
        }
    }

    out
}

/// Decodes one layer entry (without the `;` separator)
pub fn decode_layer_entry(entry: &str) -> Result<LayerRef, CodecError> {
    let entry = entry.trim();
    if entry.is_empty() {
        return Err(CodecError::EmptyEntry);
    }

    if let Some(layer) = decode_legacy_external(entry)? {
        return Ok(layer);
    }

    let mut fields = entry.split(',');
    let spec = fields.next().unwrap_or_default();

    let mut segments = spec.split('@');
    let layer_spec = segments.next().unwrap_or_default();
    let mut layer = LayerRef::new(decode_descriptor(layer_spec)?);

    for segment in segments {
        let (key, value) = segment.split_once('=').unwrap_or((segment, ""));
        let key = unescape(key)?;
        match key.as_str() {
            FEATURES_ATTRIBUTE => {
                for id in value.split(':').filter(|id| !id.is_empty()) {
                    layer.selected_feature_ids.insert(unescape(id)?);
                }
            }
            TIME_ATTRIBUTE | LEGACY_TIME_ATTRIBUTE => layer.timestamp = Some(unescape(value)?),
            ADMIN_ID_ATTRIBUTE => {
                if let ImportedLayerDescriptor::ExternalKml { admin_id, .. } =
                    &mut layer.descriptor
                {
                    *admin_id = Some(unescape(value)?);
                }
            }
            _ => {
                layer.custom_attributes.insert(key, unescape(value)?);
            }
        }
    }

    let mut opacity_seen = false;
    for flag in fields.map(str::trim) {
        match flag {
            "" => {}
            "f" | "false" => layer.visible = false,
            "t" | "true" => layer.visible = true,
            other => match other.parse::<f64>() {
                Ok(opacity) if !opacity_seen => {
                    layer.set_opacity(opacity);
                    opacity_seen = true;
                }
                _ => log::debug!("ignoring layer flag {:?} on {}", other, layer.id),
            },
        }
    }

    Ok(layer)
}

fn decode_descriptor(spec: &str) -> Result<ImportedLayerDescriptor, CodecError> {
    if !spec.contains('|') {
        let id = unescape(spec)?;
        if id.trim().is_empty() {
            return Err(CodecError::MissingLayerId);
        }
        return Ok(ImportedLayerDescriptor::catalog(id));
    }

    let parts = spec
        .split('|')
        .map(unescape)
        .collect::<Result<Vec<_>, _>>()?;
    external_descriptor(&parts, spec)
}

fn external_descriptor(
    parts: &[String],
    raw: &str,
) -> Result<ImportedLayerDescriptor, CodecError> {
    let non_empty = |index: usize| {
        parts
            .get(index)
            .filter(|p| !p.is_empty())
            .cloned()
            .ok_or_else(|| CodecError::InvalidExternal(raw.to_string()))
    };

    match parts.first().map(|p| p.to_ascii_uppercase()).as_deref() {
        Some("WMS") => Ok(ImportedLayerDescriptor::ExternalWms {
            base_url: non_empty(1)?,
            layer_name: non_empty(2)?,
            version: parts.get(3).filter(|v| !v.is_empty()).cloned(),
        }),
        Some("WMTS") => Ok(ImportedLayerDescriptor::ExternalWmts {
            capabilities_url: non_empty(1)?,
            layer_id: non_empty(2)?,
        }),
        Some("KML") => Ok(ImportedLayerDescriptor::kml(non_empty(1)?)),
        Some("GPX") => Ok(ImportedLayerDescriptor::gpx(non_empty(1)?)),
        _ => Err(CodecError::InvalidExternal(raw.to_string())),
    }
}

/// `KML||url`, `GPX||url`, `WMS||title||url||layers||version`, `WMTS||layer||url`
///
/// Only a literal `||` marks the legacy form; an escaped `%7C%7C` belongs
/// to a catalog id and is decoded with it.
fn decode_legacy_external(entry: &str) -> Result<Option<LayerRef>, CodecError> {
    let upper = entry.to_ascii_uppercase();
    let is_legacy = LEGACY_EXTERNAL_PREFIXES
        .iter()
        .any(|prefix| upper.starts_with(prefix));
    if !is_legacy {
        return Ok(None);
    }

    let parts = entry
        .split("||")
        .map(unescape)
        .collect::<Result<Vec<String>, CodecError>>()?;
    let descriptor = match parts[0].to_ascii_uppercase().as_str() {
        "WMS" => {
            // title at index 1 is display only
            let reordered = vec![
                "WMS".to_string(),
                parts.get(2).cloned().unwrap_or_default(),
                parts.get(3).cloned().unwrap_or_default(),
                parts.get(4).cloned().unwrap_or_default(),
            ];
            external_descriptor(&reordered, entry)?
        }
        "WMTS" => {
            let reordered = vec![
                "WMTS".to_string(),
                parts.get(2).cloned().unwrap_or_default(),
                parts.get(1).cloned().unwrap_or_default(),
            ];
            external_descriptor(&reordered, entry)?
        }
        _ => external_descriptor(&parts, entry)?,
    };

    Ok(Some(LayerRef::new(descriptor)))
}

fn push_attribute(out: &mut String, key: &str, value: &str) {
    out.push('@');
    out.push_str(key);
    out.push('=');
    out.push_str(value);
}

fn is_reserved_attribute(key: &str) -> bool {
    matches!(
        key,
        FEATURES_ATTRIBUTE | TIME_ATTRIBUTE | LEGACY_TIME_ATTRIBUTE | ADMIN_ID_ATTRIBUTE
    )
}

fn escape(value: &str, set: &'static AsciiSet) -> String {
    utf8_percent_encode(value, set).to_string()
}

fn unescape(value: &str) -> Result<String, CodecError> {
    percent_decode_str(value)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| CodecError::InvalidEncoding(value.to_string()))
}
