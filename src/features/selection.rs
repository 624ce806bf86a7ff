use crate::layers::manager::LayerList;
use serde::{Deserialize, Serialize};

/// Keyboard modifiers held during a map click
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct KeyModifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl KeyModifiers {
    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::default()
        }
    }

    /// Ctrl on most platforms, Cmd on macOS
    pub fn extends_selection(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// One feature returned by an identify request, attached to a layer position
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentifiedFeature {
    pub layer_index: usize,
    pub feature_id: String,
}

impl IdentifiedFeature {
    pub fn new(layer_index: usize, feature_id: impl Into<String>) -> Self {
        Self {
            layer_index,
            feature_id: feature_id.into(),
        }
    }
}

/// Applies the result of a map click to the per-layer selections.
///
/// A plain click replaces every selection with the clicked features (an empty
/// result clears everything). A click with the extend modifier toggles each
/// clicked feature in its layer's selection. Features on hidden or missing
/// layers are ignored. Returns whether anything changed.
pub fn apply_identify(
    layers: &mut LayerList,
    identified: &[IdentifiedFeature],
    modifiers: KeyModifiers,
) -> bool {
    let before = snapshot(layers);

    if !modifiers.extends_selection() {
        clear_all(layers);
    }

    for feature in identified {
        if feature.feature_id.is_empty() {
            continue;
        }
        let Some(layer) = layers.get_mut(feature.layer_index) else {
            log::debug!("identify result for missing layer {}", feature.layer_index);
            continue;
        };
        if !layer.visible {
            continue;
        }
        if modifiers.extends_selection() {
            if !layer.selected_feature_ids.shift_remove(&feature.feature_id) {
                layer.selected_feature_ids.insert(feature.feature_id.clone());
            }
        } else {
            layer.selected_feature_ids.insert(feature.feature_id.clone());
        }
    }

    snapshot(layers) != before
}

/// Clears the selection of one layer; returns whether it had one
pub fn clear_layer_selection(layers: &mut LayerList, index: usize) -> bool {
    match layers.get_mut(index) {
        Some(layer) if layer.has_selection() => {
            layer.selected_feature_ids.clear();
            true
        }
        _ => false,
    }
}

/// Clears every selection; returns whether anything was selected
pub fn clear_all(layers: &mut LayerList) -> bool {
    let mut changed = false;
    for layer in layers.iter_mut() {
        if layer.has_selection() {
            layer.selected_feature_ids.clear();
            changed = true;
        }
    }
    changed
}

/// Clears the selection of every hidden layer; returns whether anything changed
pub fn clear_hidden(layers: &mut LayerList) -> bool {
    let mut changed = false;
    for layer in layers.iter_mut().filter(|l| !l.visible) {
        if layer.has_selection() {
            layer.selected_feature_ids.clear();
            changed = true;
        }
    }
    changed
}

/// Drops selected ids the layer no longer serves; returns how many were dropped
pub fn prune_selection<'a, I>(layers: &mut LayerList, index: usize, existing_ids: I) -> usize
where
    I: IntoIterator<Item = &'a str>,
{
    let Some(layer) = layers.get_mut(index) else {
        return 0;
    };
    let existing: fxhash::FxHashSet<&str> = existing_ids.into_iter().collect();
    let before = layer.selected_feature_ids.len();
    layer
        .selected_feature_ids
        .retain(|id| existing.contains(id.as_str()));
    let dropped = before - layer.selected_feature_ids.len();
    if dropped > 0 {
        log::debug!("dropped {} stale feature ids from {}", dropped, layer.id);
    }
    dropped
}

/// Every selected feature, bottom layer first
pub fn selected_features(layers: &LayerList) -> Vec<IdentifiedFeature> {
    layers
        .iter()
        .enumerate()
        .flat_map(|(index, layer)| {
            layer
                .selected_feature_ids
                .iter()
                .map(move |id| IdentifiedFeature::new(index, id.clone()))
        })
        .collect()
}

fn snapshot(layers: &LayerList) -> Vec<Vec<String>> {
    layers
        .iter()
        .map(|l| l.selected_feature_ids.iter().cloned().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::base::LayerRef;

    fn ids(layers: &LayerList, index: usize) -> Vec<String> {
        layers
            .get(index)
            .unwrap()
            .selected_feature_ids
            .iter()
            .cloned()
            .collect()
    }

    fn two_layers() -> LayerList {
        vec![LayerRef::catalog("a"), LayerRef::catalog("b")].into()
    }

    #[test]
    fn test_ctrl_click_toggles_membership() {
        let mut layers = two_layers();

        apply_identify(
            &mut layers,
            &[IdentifiedFeature::new(0, "5678")],
            KeyModifiers::default(),
        );
        apply_identify(&mut layers, &[IdentifiedFeature::new(0, "1234")], KeyModifiers::ctrl());
        assert_eq!(ids(&layers, 0), vec!["5678", "1234"]);

        apply_identify(&mut layers, &[IdentifiedFeature::new(0, "1234")], KeyModifiers::ctrl());
        assert_eq!(ids(&layers, 0), vec!["5678"]);
    }

    #[test]
    fn test_plain_click_replaces_across_layers() {
        let mut layers = two_layers();
        apply_identify(
            &mut layers,
            &[IdentifiedFeature::new(0, "1"), IdentifiedFeature::new(1, "2")],
            KeyModifiers::default(),
        );
        apply_identify(
            &mut layers,
            &[IdentifiedFeature::new(1, "3")],
            KeyModifiers::default(),
        );

        assert!(ids(&layers, 0).is_empty());
        assert_eq!(ids(&layers, 1), vec!["3"]);
    }

    #[test]
    fn test_empty_plain_click_clears() {
        let mut layers = two_layers();
        apply_identify(&mut layers, &[IdentifiedFeature::new(0, "1")], KeyModifiers::default());

        assert!(apply_identify(&mut layers, &[], KeyModifiers::default()));
        assert!(!layers.has_selection());
        assert!(!apply_identify(&mut layers, &[], KeyModifiers::default()));
    }

    #[test]
    fn test_hidden_layers_are_not_selectable() {
        let mut layers: LayerList = vec![LayerRef::catalog("a").with_visibility(false)].into();
        let changed = apply_identify(
            &mut layers,
            &[IdentifiedFeature::new(0, "1"), IdentifiedFeature::new(7, "2")],
            KeyModifiers::default(),
        );
        assert!(!changed);
        assert!(!layers.has_selection());
    }

    #[test]
    fn test_prune_stale_ids() {
        let mut layers: LayerList = vec![LayerRef::catalog("a").with_features(["1", "2", "3"])].into();
        let dropped = prune_selection(&mut layers, 0, ["1", "3", "4"]);

        assert_eq!(dropped, 1);
        assert_eq!(ids(&layers, 0), vec!["1", "3"]);
    }

    #[test]
    fn test_selected_features_listing() {
        let layers: LayerList = vec![
            LayerRef::catalog("a").with_features(["1"]),
            LayerRef::catalog("b"),
            LayerRef::catalog("c").with_features(["2", "3"]),
        ]
        .into();

        assert_eq!(
            selected_features(&layers),
            vec![
                IdentifiedFeature::new(0, "1"),
                IdentifiedFeature::new(2, "2"),
                IdentifiedFeature::new(2, "3"),
            ]
        );
    }

    #[test]
    fn test_clear_hidden_keeps_visible_selection() {
        let mut layers: LayerList = vec![
            LayerRef::catalog("a").with_features(["1"]).with_visibility(false),
            LayerRef::catalog("b").with_features(["2"]),
        ]
        .into();

        assert!(clear_hidden(&mut layers));
        assert!(ids(&layers, 0).is_empty());
        assert_eq!(ids(&layers, 1), vec!["2"]);
        assert!(!clear_hidden(&mut layers));
    }
}
