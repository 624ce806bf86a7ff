use crate::layers::base::LayerRef;
use crate::{MapStateError, Result};
use serde::{Deserialize, Serialize};

/// Ordered list of active layers.
///
/// Index 0 is the bottom-most layer (render order). Menus that list the top
/// layer first go through [`LayerList::menu_order`]; no reversed copy is ever
/// stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerList {
    layers: Vec<LayerRef>,
}

impl LayerList {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Adds a layer on top of the stack
    pub fn push(&mut self, layer: LayerRef) {
        self.layers.push(layer);
    }

    /// Inserts a layer at `index` (clamped to the list length)
    pub fn insert(&mut self, index: usize, layer: LayerRef) {
        let index = index.min(self.layers.len());
        self.layers.insert(index, layer);
    }

    /// Removes the layer at `index`
    pub fn remove(&mut self, index: usize) -> Result<LayerRef> {
        self.check_index(index)?;
        Ok(self.layers.remove(index))
    }

    /// Moves a layer from one render position to another
    pub fn move_layer(&mut self, from: usize, to: usize) -> Result<()> {
        self.check_index(from)?;
        self.check_index(to)?;
        let layer = self.layers.remove(from);
        self.layers.insert(to, layer);
        Ok(())
    }

    /// Copies the layer at `index` right above itself; the copy starts without a selection
    pub fn duplicate(&mut self, index: usize) -> Result<usize> {
        self.check_index(index)?;
        let mut copy = self.layers[index].clone();
        copy.selected_feature_ids.clear();
        self.layers.insert(index + 1, copy);
        Ok(index + 1)
    }

    pub fn get(&self, index: usize) -> Option<&LayerRef> {
        self.layers.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut LayerRef> {
        self.layers.get_mut(index)
    }

    /// Applies a function to a specific layer mutably
    pub fn with_layer_mut<F, R>(&mut self, index: usize, f: F) -> Result<R>
    where
        F: FnOnce(&mut LayerRef) -> R,
    {
        self.check_index(index)?;
        Ok(f(&mut self.layers[index]))
    }

    /// First layer carrying `id`, bottom-up
    pub fn find_by_id(&self, id: &str) -> Option<(usize, &LayerRef)> {
        self.layers.iter().enumerate().find(|(_, l)| l.id == id)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.find_by_id(id).is_some()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &LayerRef> {
        self.layers.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut LayerRef> {
        self.layers.iter_mut()
    }

    /// Layers currently drawn, in render order
    pub fn visible_layers(&self) -> Vec<&LayerRef> {
        self.layers.iter().filter(|l| l.visible).collect()
    }

    /// Top-most layer first, as the layer menu shows them
    pub fn menu_order(&self) -> impl Iterator<Item = &LayerRef> {
        self.layers.iter().rev()
    }

    /// Converts a menu position into a render index
    pub fn menu_to_render_index(&self, menu_index: usize) -> Option<usize> {
        (menu_index < self.layers.len()).then(|| self.layers.len() - 1 - menu_index)
    }

    pub fn has_selection(&self) -> bool {
        self.layers.iter().any(LayerRef::has_selection)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn as_slice(&self) -> &[LayerRef] {
        &self.layers
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.layers.len() {
            Ok(())
        } else {
            Err(MapStateError::Layer(format!(
                "no layer at index {} (list has {})",
                index,
                self.layers.len()
            ))
            .into())
        }
    }
}

impl From<Vec<LayerRef>> for LayerList {
    fn from(layers: Vec<LayerRef>) -> Self {
        Self { layers }
    }
}

impl FromIterator<LayerRef> for LayerList {
    fn from_iter<T: IntoIterator<Item = LayerRef>>(iter: T) -> Self {
        Self {
            layers: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for LayerList {
    type Item = LayerRef;
    type IntoIter = std::vec::IntoIter<LayerRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.layers.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &LayerList) -> Vec<&str> {
        list.iter().map(|l| l.id.as_str()).collect()
    }

    #[test]
    fn test_duplicate_ids_are_distinct_entries() {
        let mut list = LayerList::new();
        list.push(LayerRef::catalog("a").with_opacity(0.3));
        list.push(LayerRef::catalog("a").with_opacity(0.8));

        assert_eq!(list.len(), 2);
        assert_eq!(list.get(0).unwrap().opacity(), 0.3);
        assert_eq!(list.get(1).unwrap().opacity(), 0.8);
    }

    #[test]
    fn test_move_and_menu_order() {
        let mut list: LayerList = vec![
            LayerRef::catalog("a"),
            LayerRef::catalog("b"),
            LayerRef::catalog("c"),
        ]
        .into();

        list.move_layer(0, 2).unwrap();
        assert_eq!(ids(&list), vec!["b", "c", "a"]);

        let menu: Vec<&str> = list.menu_order().map(|l| l.id.as_str()).collect();
        assert_eq!(menu, vec!["a", "c", "b"]);
        assert_eq!(list.menu_to_render_index(0), Some(2));
        assert_eq!(list.menu_to_render_index(3), None);
    }

    #[test]
    fn test_duplicate_drops_selection() {
        let mut list: LayerList = vec![LayerRef::catalog("a").with_features(["1"])].into();
        let copy = list.duplicate(0).unwrap();

        assert_eq!(copy, 1);
        assert!(list.get(0).unwrap().has_selection());
        assert!(!list.get(1).unwrap().has_selection());
    }

    #[test]
    fn test_out_of_range_index_is_an_error() {
        let mut list = LayerList::new();
        assert!(list.remove(0).is_err());
        assert!(list.move_layer(0, 1).is_err());
        assert!(list.duplicate(3).is_err());
    }

    #[test]
    fn test_visible_layers() {
        let list: LayerList = vec![
            LayerRef::catalog("a"),
            LayerRef::catalog("b").with_visibility(false),
        ]
        .into();
        let visible: Vec<&str> = list.visible_layers().iter().map(|l| l.id.as_str()).collect();
        assert_eq!(visible, vec!["a"]);
    }
}
