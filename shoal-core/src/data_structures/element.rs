/// A key together with one of its values, as returned by reads and removes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Element<K, V> {
    pub key: K,
    pub value: V,
}

impl<K, V> Element<K, V> {
    pub fn new(key: K, value: V) -> Self {
        Element { key, value }
    }

    pub fn into_parts(self) -> (K, V) {
        (self.key, self.value)
    }
}

impl<K, V> From<(K, V)> for Element<K, V> {
    fn from((key, value): (K, V)) -> Self {
        Element { key, value }
    }
}
