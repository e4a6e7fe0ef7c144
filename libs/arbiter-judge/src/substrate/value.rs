//! Runtime values of the substrate
//!
//! Lists and maps have reference semantics (`Rc<RefCell<..>>`), matching
//! how all three source languages pass collections around. Values never
//! leave the thread that created them; conversion to and from the shared
//! [`Value`] type happens at the sandbox boundary.

use super::Dialect;
use arbiter_common::types::Value;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Nesting depth past which a value is treated as cyclic on conversion
pub const MAX_CONVERT_DEPTH: usize = 256;

pub type ListRef = Rc<RefCell<Vec<Dyn>>>;
pub type MapRef = Rc<RefCell<DynMap>>;

#[derive(Debug, Clone)]
pub enum Dyn {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// C-family character; arithmetic sees its code point
    Char(char),
    Str(Rc<str>),
    List(ListRef),
    Map(MapRef),
}

/// Hashable form of a value, used for map keys and set members
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Key {
    Bool(bool),
    Int(i64),
    Char(char),
    Str(String),
    /// Frozen sequence (`(r, c)` tuples, `List<Integer>` keys)
    Seq(Vec<Key>),
}

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    value: Dyn,
}

/// Map or set storage.
///
/// Entries remember when they were first inserted so that iteration can
/// follow insertion order (Python dicts) or key order (C-family).
#[derive(Debug, Clone, Default)]
pub struct DynMap {
    entries: BTreeMap<Key, Entry>,
    next_seq: u64,
    /// Members only, values are ignored
    pub is_set: bool,
    /// Value materialised for a missing key on read (`defaultdict`, `std::map::operator[]`)
    pub default: Option<Dyn>,
}

impl DynMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_set() -> Self {
        Self {
            is_set: true,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Key) -> Option<&Dyn> {
        self.entries.get(key).map(|e| &e.value)
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or overwrite. Overwriting keeps the original insertion position.
    pub fn insert(&mut self, key: Key, value: Dyn) {
        match self.entries.get_mut(&key) {
            Some(entry) => entry.value = value,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.entries.insert(key, Entry { seq, value });
            }
        }
    }

    pub fn remove(&mut self, key: &Key) -> Option<Dyn> {
        self.entries.remove(key).map(|e| e.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries in the iteration order of the dialect
    pub fn ordered(&self, dialect: Dialect) -> Vec<(Key, Dyn)> {
        let mut items: Vec<(&Key, &Entry)> = self.entries.iter().collect();
        if dialect.insertion_ordered_maps() {
            items.sort_by_key(|(_, e)| e.seq);
        }
        items
            .into_iter()
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect()
    }

    pub fn first_key(&self) -> Option<Key> {
        self.entries.keys().next().cloned()
    }

    pub fn last_key(&self) -> Option<Key> {
        self.entries.keys().next_back().cloned()
    }
}

impl Dyn {
    pub fn str(s: &str) -> Dyn {
        Dyn::Str(Rc::from(s))
    }

    pub fn list(items: Vec<Dyn>) -> Dyn {
        Dyn::List(Rc::new(RefCell::new(items)))
    }

    pub fn map(map: DynMap) -> Dyn {
        Dyn::Map(Rc::new(RefCell::new(map)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Dyn::Null => "null",
            Dyn::Bool(_) => "bool",
            Dyn::Int(_) => "int",
            Dyn::Float(_) => "float",
            Dyn::Char(_) => "char",
            Dyn::Str(_) => "string",
            Dyn::List(_) => "list",
            Dyn::Map(m) if m.borrow().is_set => "set",
            Dyn::Map(_) => "map",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Dyn::Null => false,
            Dyn::Bool(b) => *b,
            Dyn::Int(n) => *n != 0,
            Dyn::Float(f) => *f != 0.0,
            Dyn::Char(c) => *c != '\0',
            Dyn::Str(s) => !s.is_empty(),
            Dyn::List(l) => !l.borrow().is_empty(),
            Dyn::Map(m) => !m.borrow().is_empty(),
        }
    }

    /// Numeric view: ints, chars (code point) and bools widen to i64
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Dyn::Int(n) => Some(*n),
            Dyn::Char(c) => Some(*c as i64),
            Dyn::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Dyn::Float(f) => Some(*f),
            other => other.as_int().map(|n| n as f64),
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Dyn::Int(_) | Dyn::Float(_) | Dyn::Char(_) | Dyn::Bool(_))
    }

    /// Textual form used by `str()` and string concatenation
    pub fn render(&self) -> String {
        match self {
            Dyn::Null => "null".to_string(),
            Dyn::Bool(b) => b.to_string(),
            Dyn::Int(n) => n.to_string(),
            Dyn::Float(f) => format_float(*f),
            Dyn::Char(c) => c.to_string(),
            Dyn::Str(s) => s.to_string(),
            Dyn::List(l) => {
                let parts: Vec<String> = l.borrow().iter().map(|v| v.render()).collect();
                format!("[{}]", parts.join(", "))
            }
            Dyn::Map(m) => {
                let m = m.borrow();
                let parts: Vec<String> = m
                    .entries
                    .iter()
                    .map(|(k, e)| {
                        if m.is_set {
                            k.to_dyn().render()
                        } else {
                            format!("{}: {}", k.to_dyn().render(), e.value.render())
                        }
                    })
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
        }
    }

    /// Fresh copy of this value and everything it owns
    pub fn deep_clone(&self) -> Dyn {
        match self {
            Dyn::List(l) => Dyn::list(l.borrow().iter().map(Dyn::deep_clone).collect()),
            Dyn::Map(m) => {
                let m = m.borrow();
                let mut copy = m.clone();
                for entry in copy.entries.values_mut() {
                    entry.value = entry.value.deep_clone();
                }
                Dyn::map(copy)
            }
            other => other.clone(),
        }
    }

    /// One-level copy: a new container holding the same element references
    pub fn shallow_clone(&self) -> Dyn {
        match self {
            Dyn::List(l) => Dyn::list(l.borrow().clone()),
            Dyn::Map(m) => Dyn::map(m.borrow().clone()),
            other => other.clone(),
        }
    }

    pub fn from_value(value: &Value) -> Dyn {
        match value {
            Value::Null => Dyn::Null,
            Value::Bool(b) => Dyn::Bool(*b),
            Value::Int(n) => Dyn::Int(*n),
            Value::Float(f) => Dyn::Float(*f),
            Value::Str(s) => Dyn::str(s),
            Value::Seq(items) => Dyn::list(items.iter().map(Dyn::from_value).collect()),
            Value::Map(entries) => {
                let mut map = DynMap::new();
                for (k, v) in entries {
                    map.insert(Key::Str(k.clone()), Dyn::from_value(v));
                }
                Dyn::map(map)
            }
        }
    }

    /// Convert back to a shareable value.
    ///
    /// Sets become sequences in key order, map keys are rendered as strings,
    /// characters become one-character strings.
    pub fn to_value(&self) -> Result<Value, String> {
        self.to_value_at(0)
    }

    fn to_value_at(&self, depth: usize) -> Result<Value, String> {
        if depth > MAX_CONVERT_DEPTH {
            return Err("returned value is nested too deeply or cyclic".to_string());
        }
        Ok(match self {
            Dyn::Null => Value::Null,
            Dyn::Bool(b) => Value::Bool(*b),
            Dyn::Int(n) => Value::Int(*n),
            Dyn::Float(f) => Value::Float(*f),
            Dyn::Char(c) => Value::Str(c.to_string()),
            Dyn::Str(s) => Value::Str(s.to_string()),
            Dyn::List(l) => Value::Seq(
                l.borrow()
                    .iter()
                    .map(|v| v.to_value_at(depth + 1))
                    .collect::<Result<_, _>>()?,
            ),
            Dyn::Map(m) => {
                let m = m.borrow();
                if m.is_set {
                    Value::Seq(
                        m.entries
                            .keys()
                            .map(|k| k.to_dyn().to_value_at(depth + 1))
                            .collect::<Result<_, _>>()?,
                    )
                } else {
                    let mut out = BTreeMap::new();
                    for (k, e) in &m.entries {
                        out.insert(k.to_dyn().render(), e.value.to_value_at(depth + 1)?);
                    }
                    Value::Map(out)
                }
            }
        })
    }
}

impl Key {
    pub fn from_dyn(value: &Dyn) -> Result<Key, String> {
        match value {
            Dyn::Bool(b) => Ok(Key::Bool(*b)),
            Dyn::Int(n) => Ok(Key::Int(*n)),
            Dyn::Float(f) if f.fract() == 0.0 && f.is_finite() => Ok(Key::Int(*f as i64)),
            Dyn::Char(c) => Ok(Key::Char(*c)),
            Dyn::Str(s) => Ok(Key::Str(s.to_string())),
            Dyn::List(l) => Ok(Key::Seq(
                l.borrow().iter().map(Key::from_dyn).collect::<Result<_, _>>()?,
            )),
            other => Err(format!("unhashable key of type {}", other.type_name())),
        }
    }

    pub fn to_dyn(&self) -> Dyn {
        match self {
            Key::Bool(b) => Dyn::Bool(*b),
            Key::Int(n) => Dyn::Int(*n),
            Key::Char(c) => Dyn::Char(*c),
            Key::Str(s) => Dyn::str(s),
            Key::Seq(items) => Dyn::list(items.iter().map(Key::to_dyn).collect()),
        }
    }
}

pub fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

/// Equality as `==` sees it: numbers compare by value across int/float/char,
/// collections compare structurally.
pub fn loose_eq(a: &Dyn, b: &Dyn) -> bool {
    match (a, b) {
        (Dyn::Null, Dyn::Null) => true,
        (Dyn::Str(x), Dyn::Str(y)) => x == y,
        (Dyn::Str(s), Dyn::Char(c)) | (Dyn::Char(c), Dyn::Str(s)) => {
            let mut chars = s.chars();
            chars.next() == Some(*c) && chars.next().is_none()
        }
        (Dyn::List(x), Dyn::List(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(p, q)| loose_eq(p, q))
        }
        (Dyn::Map(x), Dyn::Map(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len()
                && x.entries
                    .iter()
                    .all(|(k, e)| y.get(k).is_some_and(|v| loose_eq(&e.value, v)))
        }
        (Dyn::Int(x), Dyn::Int(y)) => x == y,
        (x, y) if x.is_number() && y.is_number() => match (x.as_float(), y.as_float()) {
            (Some(p), Some(q)) => p == q,
            _ => false,
        },
        _ => false,
    }
}

/// Ordering used by `<`, `sort` and `min`/`max`
pub fn compare(a: &Dyn, b: &Dyn) -> Result<Ordering, String> {
    match (a, b) {
        (Dyn::Int(x), Dyn::Int(y)) => Ok(x.cmp(y)),
        (Dyn::Str(x), Dyn::Str(y)) => Ok(x.cmp(y)),
        (Dyn::Str(s), Dyn::Char(c)) => Ok(s.as_ref().cmp(c.to_string().as_str())),
        (Dyn::Char(c), Dyn::Str(s)) => Ok(c.to_string().as_str().cmp(s.as_ref())),
        (Dyn::List(x), Dyn::List(y)) => {
            let (x, y) = (x.borrow().clone(), y.borrow().clone());
            for (p, q) in x.iter().zip(y.iter()) {
                match compare(p, q)? {
                    Ordering::Equal => continue,
                    other => return Ok(other),
                }
            }
            Ok(x.len().cmp(&y.len()))
        }
        (x, y) if x.is_number() && y.is_number() => match (x.as_int(), y.as_int()) {
            (Some(p), Some(q)) => Ok(p.cmp(&q)),
            _ => {
                let (p, q) = (x.as_float().unwrap_or(f64::NAN), y.as_float().unwrap_or(f64::NAN));
                Ok(p.partial_cmp(&q).unwrap_or(Ordering::Equal))
            }
        },
        (x, y) => Err(format!(
            "cannot compare {} with {}",
            x.type_name(),
            y.type_name()
        )),
    }
}

impl fmt::Display for Dyn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_share_on_clone() {
        let a = Dyn::list(vec![Dyn::Int(1)]);
        let b = a.clone();
        if let Dyn::List(l) = &b {
            l.borrow_mut().push(Dyn::Int(2));
        }
        assert_eq!(a.render(), "[1, 2]");
    }

    #[test]
    fn test_deep_clone_detaches() {
        let inner = Dyn::list(vec![Dyn::Int(0)]);
        let outer = Dyn::list(vec![inner.clone()]);
        let copy = outer.deep_clone();
        if let Dyn::List(l) = &inner {
            l.borrow_mut().push(Dyn::Int(9));
        }
        assert_eq!(outer.render(), "[[0, 9]]");
        assert_eq!(copy.render(), "[[0]]");
    }

    #[test]
    fn test_map_iteration_order_by_dialect() {
        let mut map = DynMap::new();
        map.insert(Key::Int(3), Dyn::Int(0));
        map.insert(Key::Int(1), Dyn::Int(0));
        map.insert(Key::Int(3), Dyn::Int(5));
        let py: Vec<Key> = map.ordered(Dialect::Python).into_iter().map(|(k, _)| k).collect();
        let c: Vec<Key> = map.ordered(Dialect::CFamily).into_iter().map(|(k, _)| k).collect();
        assert_eq!(py, vec![Key::Int(3), Key::Int(1)]);
        assert_eq!(c, vec![Key::Int(1), Key::Int(3)]);
        assert!(matches!(map.get(&Key::Int(3)), Some(Dyn::Int(5))));
    }

    #[test]
    fn test_to_value_stringifies_keys_and_sets() {
        let mut map = DynMap::new();
        map.insert(Key::Int(1), Dyn::Char('a'));
        assert_eq!(
            Dyn::map(map).to_value().unwrap(),
            Value::Map(BTreeMap::from([("1".to_string(), Value::Str("a".into()))]))
        );

        let mut set = DynMap::new_set();
        set.insert(Key::Int(2), Dyn::Null);
        set.insert(Key::Int(1), Dyn::Null);
        assert_eq!(
            Dyn::map(set).to_value().unwrap(),
            Value::Seq(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn test_cycle_is_reported() {
        let list = Dyn::list(vec![]);
        if let Dyn::List(l) = &list {
            l.borrow_mut().push(list.clone());
        }
        assert!(list.to_value().is_err());
        // break the cycle so the test does not leak
        if let Dyn::List(l) = &list {
            l.borrow_mut().clear();
        }
    }

    #[test]
    fn test_loose_equality_and_ordering() {
        assert!(loose_eq(&Dyn::Int(2), &Dyn::Float(2.0)));
        assert!(loose_eq(&Dyn::Char('a'), &Dyn::str("a")));
        assert!(!loose_eq(&Dyn::Null, &Dyn::Int(0)));
        assert_eq!(compare(&Dyn::Char('b'), &Dyn::Int(97)).unwrap(), Ordering::Greater);
        assert!(compare(&Dyn::str("a"), &Dyn::Int(1)).is_err());
    }

    #[test]
    fn test_tuple_keys() {
        let key = Key::from_dyn(&Dyn::list(vec![Dyn::Int(1), Dyn::Int(2)])).unwrap();
        assert_eq!(key, Key::Seq(vec![Key::Int(1), Key::Int(2)]));
        assert!(Key::from_dyn(&Dyn::Null).is_err());
    }
}
