/// Extension and layer negotiation
///
/// The same pure function runs at instance scope and at device scope: given what
/// the driver exposes and what the application requests, it returns the names
/// to enable, or fails on the first required item that is not available.

use rustc_hash::{FxHashMap, FxHashSet};
use crate::error::{Error, Result};

/// One requested extension or layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRequest {
    pub name: String,
    /// Missing required features fail negotiation, missing optional ones are dropped
    pub required: bool,
}

impl FeatureRequest {
    pub fn required(name: impl Into<String>) -> Self {
        Self { name: name.into(), required: true }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self { name: name.into(), required: false }
    }
}

/// Negotiation scope, used for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureScope {
    Instance,
    Device,
}

impl FeatureScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureScope::Instance => "instance",
            FeatureScope::Device => "device",
        }
    }
}

/// Extensions and layers exposed by the driver
#[derive(Debug, Clone, Default)]
pub struct AvailableFeatures {
    pub extensions: Vec<String>,
    pub layers: Vec<String>,
}

/// Extensions and layers requested by the application
#[derive(Debug, Clone, Default)]
pub struct FeatureRequests {
    pub extensions: Vec<FeatureRequest>,
    pub layers: Vec<FeatureRequest>,
}

/// Result of a successful negotiation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NegotiatedFeatures {
    pub extension_names: Vec<String>,
    pub layer_names: Vec<String>,
}

/// Compute the supported subset of `requested`
///
/// # Errors
///
/// `Error::MissingRequiredFeature` naming the first required item absent from `available`.
pub fn negotiate(
    scope: FeatureScope,
    available: &AvailableFeatures,
    requested: &FeatureRequests,
) -> Result<NegotiatedFeatures> {
    Ok(NegotiatedFeatures {
        extension_names: negotiate_list(scope, "extension", &available.extensions, &requested.extensions)?,
        layer_names: negotiate_list(scope, "layer", &available.layers, &requested.layers)?,
    })
}

/// Merge duplicate names, keeping first-seen order. A name is required if any duplicate is.
pub fn dedup_requests(requested: &[FeatureRequest]) -> Vec<FeatureRequest> {
    let mut merged: Vec<FeatureRequest> = Vec::with_capacity(requested.len());
    let mut positions: FxHashMap<&str, usize> = FxHashMap::default();

    for request in requested {
        match positions.get(request.name.as_str()) {
            Some(&pos) => merged[pos].required |= request.required,
            None => {
                positions.insert(request.name.as_str(), merged.len());
                merged.push(request.clone());
            }
        }
    }

    merged
}

fn negotiate_list(
    scope: FeatureScope,
    kind: &str,
    available: &[String],
    requested: &[FeatureRequest],
) -> Result<Vec<String>> {
    for name in available {
        crate::engine_trace!("ya::FeatureNegotiator", "Available {} {}: {}", scope.as_str(), kind, name);
    }

    let available: FxHashSet<&str> = available.iter().map(String::as_str).collect();
    let mut enabled = Vec::new();

    for request in dedup_requests(requested) {
        if available.contains(request.name.as_str()) {
            crate::engine_debug!(
                "ya::FeatureNegotiator",
                "Enabling {} {}: {}",
                scope.as_str(), kind, request.name
            );
            enabled.push(request.name);
        } else if request.required {
            crate::engine_error!(
                "ya::FeatureNegotiator",
                "Required {} {} not available: {}",
                scope.as_str(), kind, request.name
            );
            return Err(Error::MissingRequiredFeature {
                scope: scope.as_str().to_string(),
                name: request.name,
            });
        } else {
            crate::engine_warn!(
                "ya::FeatureNegotiator",
                "Optional {} {} not available, dropped: {}",
                scope.as_str(), kind, request.name
            );
        }
    }

    Ok(enabled)
}

#[cfg(test)]
#[path = "feature_tests.rs"]
mod tests;
