use indexmap::IndexMap;

/// Encoded image bytes with their declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageData {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    pub identity: String,
    pub data: ImageData,
    pub active: bool,
}

/// Uploaded reference images keyed by identity (the source file name).
///
/// Insertion order is kept and is the order in which active references are
/// attached to a generation request.
#[derive(Debug, Clone, Default)]
pub struct ReferenceStore {
    entries: IndexMap<String, ReferenceImage>,
}

impl ReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reference unless one with the same identity exists.
    /// Returns whether the image was stored; the first upload of a name wins.
    pub fn add(&mut self, identity: &str, data: ImageData) -> bool {
        if self.entries.contains_key(identity) {
            return false;
        }
        self.entries.insert(
            identity.to_string(),
            ReferenceImage {
                identity: identity.to_string(),
                data,
                active: false,
            },
        );
        true
    }

    /// Returns false when no reference carries `identity`.
    pub fn toggle(&mut self, identity: &str, active: bool) -> bool {
        match self.entries.get_mut(identity) {
            Some(entry) => {
                entry.active = active;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn active_list(&self) -> Vec<&ImageData> {
        self.entries
            .values()
            .filter(|entry| entry.active)
            .map(|entry| &entry.data)
            .collect()
    }

    pub fn get(&self, identity: &str) -> Option<&ReferenceImage> {
        self.entries.get(identity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceImage> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{ImageData, ReferenceStore};

    fn png(tag: u8) -> ImageData {
        ImageData::new("image/png", vec![tag])
    }

    #[test]
    fn add_is_first_write_wins_by_identity() {
        let mut store = ReferenceStore::new();
        assert!(store.add("tower.png", png(1)));
        assert!(!store.add("tower.png", png(2)));
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get("tower.png").map(|entry| entry.data.bytes.clone()),
            Some(vec![1])
        );
    }

    #[test]
    fn new_references_start_inactive() {
        let mut store = ReferenceStore::new();
        store.add("a.png", png(1));
        assert!(store.active_list().is_empty());
        assert_eq!(store.get("a.png").map(|entry| entry.active), Some(false));
    }

    #[test]
    fn active_list_follows_insertion_order() {
        let mut store = ReferenceStore::new();
        store.add("c.png", png(3));
        store.add("a.png", png(1));
        store.add("b.png", png(2));
        assert!(store.toggle("b.png", true));
        assert!(store.toggle("c.png", true));

        let active: Vec<u8> = store.active_list().iter().map(|data| data.bytes[0]).collect();
        assert_eq!(active, vec![3, 2]);
        assert!(store.active_list().len() <= store.len());
    }

    #[test]
    fn toggle_off_removes_from_active_list() {
        let mut store = ReferenceStore::new();
        store.add("a.png", png(1));
        store.toggle("a.png", true);
        store.toggle("a.png", false);
        assert!(store.active_list().is_empty());
        assert!(!store.toggle("missing.png", true));
    }

    #[test]
    fn clear_drops_every_entry() {
        let mut store = ReferenceStore::new();
        store.add("a.png", png(1));
        store.add("b.png", png(2));
        store.clear();
        assert!(store.is_empty());
        assert!(store.add("a.png", png(9)));
    }
}
