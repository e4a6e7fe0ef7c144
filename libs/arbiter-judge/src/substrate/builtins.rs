//! Builtin functions available to substrate programs
//!
//! This table is the entire capability surface of judged code: there is no
//! I/O, no clock, no randomness, and nothing that reaches outside the
//! values passed in. Every normalizer rewrite targets one of these names.

use super::ast::BinaryOp;
use super::interpreter::{Budget, Trap};
use super::ops::{self, elements, fault, resolve_index};
use super::value::{compare, loose_eq, Dyn, DynMap, Key};
use super::Dialect;
use std::cmp::Ordering;

const VARIADIC: usize = usize::MAX;

macro_rules! builtins {
    ($($variant:ident => $name:literal, $min:expr, $max:expr;)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Builtin {
            $($variant,)*
        }

        impl Builtin {
            pub fn from_name(name: &str) -> Option<Builtin> {
                match name {
                    $($name => Some(Builtin::$variant),)*
                    _ => None,
                }
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $(Builtin::$variant => $name,)*
                }
            }

            /// Accepted argument counts (inclusive)
            pub fn arity(&self) -> (usize, usize) {
                match self {
                    $(Builtin::$variant => ($min, $max),)*
                }
            }
        }
    };
}

builtins! {
    Len => "len", 1, 1;
    Has => "has", 2, 2;
    Get => "get", 2, 3;
    FindEntry => "find_entry", 2, 2;
    Set => "set", 3, 3;
    Add => "add", 2, 2;
    Push => "push", 2, 2;
    Pop => "pop", 1, 3;
    Shift => "shift", 1, 1;
    Unshift => "unshift", 2, 2;
    Insert => "insert", 3, 3;
    Remove => "remove", 2, 2;
    RemoveAt => "remove_at", 2, 2;
    RemoveValue => "remove_value", 2, 2;
    Clear => "clear", 1, 1;
    Extend => "extend", 2, 2;
    First => "first", 1, 1;
    Last => "last", 1, 1;
    Keys => "keys", 1, 1;
    Values => "values", 1, 1;
    Items => "items", 1, 1;
    Range => "range", 1, 3;
    Enumerate => "enumerate", 1, 2;
    Zip => "zip", 2, 2;
    Fill => "fill", 2, 2;
    FillIn => "fill_in", 2, 2;
    Copy => "copy", 1, 1;
    DeepCopy => "clone", 1, 1;
    ToList => "to_list", 0, 1;
    ToSet => "to_set", 0, 1;
    NewSet => "new_set", 0, 0;
    NewMap => "new_map", 0, 1;
    PutIfAbsent => "put_if_absent", 3, 3;
    ComputeIfAbsent => "compute_if_absent", 3, 3;
    MergeAdd => "merge_add", 3, 3;
    Min => "min", 1, VARIADIC;
    Max => "max", 1, VARIADIC;
    Abs => "abs", 1, 1;
    Sum => "sum", 1, 2;
    Sqrt => "sqrt", 1, 1;
    Pow => "pow", 2, 2;
    Floor => "floor", 1, 1;
    Ceil => "ceil", 1, 1;
    Round => "round", 1, 1;
    Log => "log", 1, 2;
    Gcd => "gcd", 2, 2;
    BitCount => "bit_count", 1, 1;
    Sort => "sort", 1, 2;
    Sorted => "sorted", 1, 2;
    Reverse => "reverse", 1, 1;
    Reversed => "reversed", 1, 1;
    HeapPush => "heap_push", 2, 3;
    HeapPop => "heap_pop", 1, 2;
    Heapify => "heapify", 1, 2;
    Str => "str", 1, 1;
    Int => "int", 1, 2;
    Float => "float", 1, 1;
    Chars => "chars", 1, 1;
    Join => "join", 1, 2;
    Split => "split", 1, 2;
    Lower => "lower", 1, 1;
    Upper => "upper", 1, 1;
    Trim => "trim", 1, 1;
    Replace => "replace", 3, 3;
    Substring => "substring", 2, 3;
    Substr => "substr", 2, 3;
    IndexOf => "index_of", 2, 3;
    LastIndexOf => "last_index_of", 2, 2;
    StartsWith => "starts_with", 2, 2;
    EndsWith => "ends_with", 2, 2;
    IsDigit => "is_digit", 1, 1;
    IsAlpha => "is_alpha", 1, 1;
    IsAlnum => "is_alnum", 1, 1;
    IsUpper => "is_upper", 1, 1;
    IsLower => "is_lower", 1, 1;
    IsSpace => "is_space", 1, 1;
    Ord => "ord", 1, 1;
    Chr => "chr", 1, 1;
    Count => "count", 2, 2;
    IsEmpty => "is_empty", 1, 1;
    Slice => "slice", 1, 4;
    At => "at", 2, 2;
    Compare => "compare", 2, 2;
    Print => "print", 0, VARIADIC;
    Fail => "fail", 0, 1;
    Any => "any", 1, 1;
    All => "all", 1, 1;
}

fn key_of(value: &Dyn) -> Result<Key, Trap> {
    Key::from_dyn(value).map_err(Trap::Runtime)
}

fn int_arg(value: &Dyn, what: &str) -> Result<i64, Trap> {
    value
        .as_int()
        .map_or_else(
            || fault(format!("{} must be an integer, not {}", what, value.type_name())),
            Ok,
        )
}

fn float_arg(value: &Dyn, what: &str) -> Result<f64, Trap> {
    value
        .as_float()
        .map_or_else(|| fault(format!("{} must be a number, not {}", what, value.type_name())), Ok)
}

fn text_of(value: &Dyn, what: &str) -> Result<String, Trap> {
    match value {
        Dyn::Str(s) => Ok(s.to_string()),
        Dyn::Char(c) => Ok(c.to_string()),
        other => fault(format!("{} must be a string, not {}", what, other.type_name())),
    }
}

fn wrong_type<T>(builtin: Builtin, value: &Dyn) -> Result<T, Trap> {
    fault(format!("{}() does not accept {}", builtin.name(), value.type_name()))
}

/// Same kind of text as `like`: a one-char result of a char stays a char
fn text_like(like: &Dyn, text: String) -> Dyn {
    match like {
        Dyn::Char(_) => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Dyn::Char(c),
                _ => Dyn::str(&text),
            }
        }
        _ => Dyn::str(&text),
    }
}

fn sort_values(items: &mut [Dyn], descending: bool) -> Result<(), Trap> {
    let mut error = None;
    items.sort_by(|a, b| match compare(a, b) {
        Ok(ord) if descending => ord.reverse(),
        Ok(ord) => ord,
        Err(e) => {
            error.get_or_insert(e);
            Ordering::Equal
        }
    });
    match error {
        Some(e) => fault(e),
        None => Ok(()),
    }
}

fn heap_less(a: &Dyn, b: &Dyn, max: bool) -> Result<bool, Trap> {
    let ord = compare(a, b).map_err(Trap::Runtime)?;
    Ok(if max { ord == Ordering::Greater } else { ord == Ordering::Less })
}

fn sift_up(heap: &mut [Dyn], mut i: usize, max: bool) -> Result<(), Trap> {
    while i > 0 {
        let parent = (i - 1) / 2;
        if !heap_less(&heap[i], &heap[parent], max)? {
            break;
        }
        heap.swap(i, parent);
        i = parent;
    }
    Ok(())
}

fn sift_down(heap: &mut [Dyn], mut i: usize, max: bool) -> Result<(), Trap> {
    loop {
        let (left, right) = (2 * i + 1, 2 * i + 2);
        let mut best = i;
        if left < heap.len() && heap_less(&heap[left], &heap[best], max)? {
            best = left;
        }
        if right < heap.len() && heap_less(&heap[right], &heap[best], max)? {
            best = right;
        }
        if best == i {
            return Ok(());
        }
        heap.swap(i, best);
        i = best;
    }
}

/// Python slice bounds for `len` with optional start/stop and a non-zero step
fn slice_indices(len: usize, start: &Dyn, stop: &Dyn, step: i64) -> Result<Vec<usize>, Trap> {
    let len = len as i64;
    let clamp = |v: &Dyn, default: i64, lo: i64, hi: i64| -> Result<i64, Trap> {
        match v {
            Dyn::Null => Ok(default),
            other => {
                let mut n = int_arg(other, "slice index")?;
                if n < 0 {
                    n += len;
                }
                Ok(n.clamp(lo, hi))
            }
        }
    };
    let mut out = Vec::new();
    if step > 0 {
        let (a, b) = (clamp(start, 0, 0, len)?, clamp(stop, len, 0, len)?);
        let mut i = a;
        while i < b {
            out.push(i as usize);
            match i.checked_add(step) {
                Some(n) => i = n,
                None => break,
            }
        }
    } else {
        let (a, b) = (clamp(start, len - 1, -1, len - 1)?, clamp(stop, -1, -1, len - 1)?);
        let mut i = a;
        while i > b {
            out.push(i as usize);
            match i.checked_add(step) {
                Some(n) => i = n,
                None => break,
            }
        }
    }
    Ok(out)
}

fn split_text(text: &str, sep: Option<&str>, dialect: Dialect) -> Vec<Dyn> {
    let whitespace = match sep {
        None => true,
        Some(s) => matches!(s, "\\s+" | "\\s" | " +" | "\\s*"),
    };
    if whitespace {
        return text.split_whitespace().map(Dyn::str).collect();
    }
    let sep = sep.unwrap_or(" ");
    // single escaped regex metacharacter (`\\.`, `\\|`)
    let sep = match sep.strip_prefix('\\') {
        Some(rest) if rest.chars().count() == 1 && dialect == Dialect::CFamily => rest,
        _ => sep,
    };
    let mut parts: Vec<&str> = if sep.is_empty() {
        text.split("").filter(|p| !p.is_empty()).collect()
    } else {
        text.split(sep).collect()
    };
    if dialect == Dialect::CFamily {
        // trailing empty strings are dropped by String.split
        while parts.last().is_some_and(|p| p.is_empty()) && parts.len() > 1 {
            parts.pop();
        }
    }
    parts.into_iter().map(Dyn::str).collect()
}

fn char_test(value: &Dyn, builtin: Builtin, test: fn(char) -> bool) -> Result<Dyn, Trap> {
    match value {
        Dyn::Char(c) => Ok(Dyn::Bool(test(*c))),
        Dyn::Str(s) => Ok(Dyn::Bool(!s.is_empty() && s.chars().all(test))),
        other => wrong_type(builtin, other),
    }
}

fn extremum(builtin: Builtin, args: &[Dyn], dialect: Dialect) -> Result<Dyn, Trap> {
    let items = if args.len() == 1 {
        elements(&args[0], dialect)?
    } else {
        args.to_vec()
    };
    let mut best: Option<Dyn> = None;
    for item in items {
        best = Some(match best {
            None => item,
            Some(current) => {
                let ord = compare(&item, &current).map_err(Trap::Runtime)?;
                let better = match builtin {
                    Builtin::Min => ord == Ordering::Less,
                    _ => ord == Ordering::Greater,
                };
                if better {
                    item
                } else {
                    current
                }
            }
        });
    }
    best.map_or_else(|| fault(format!("{}() arg is an empty sequence", builtin.name())), Ok)
}

fn python_repr(value: &Dyn) -> String {
    match value {
        Dyn::Null => "None".to_string(),
        Dyn::Bool(true) => "True".to_string(),
        Dyn::Bool(false) => "False".to_string(),
        other => other.render(),
    }
}

fn parse_int(text: &str, radix: u32) -> Result<i64, Trap> {
    let trimmed = text.trim();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    i64::from_str_radix(digits, radix)
        .map_or_else(|_| fault(format!("invalid literal for int(): {:?}", text)), Ok)
}

pub fn call(
    builtin: Builtin,
    args: Vec<Dyn>,
    dialect: Dialect,
    budget: &mut Budget,
) -> Result<Dyn, Trap> {
    use Builtin as B;
    let arg = |i: usize| args.get(i).cloned().unwrap_or(Dyn::Null);

    match builtin {
        B::Len => match &args[0] {
            Dyn::Str(s) => Ok(Dyn::Int(s.chars().count() as i64)),
            Dyn::List(l) => Ok(Dyn::Int(l.borrow().len() as i64)),
            Dyn::Map(m) => Ok(Dyn::Int(m.borrow().len() as i64)),
            other => wrong_type(builtin, other),
        },
        B::IsEmpty => match &args[0] {
            Dyn::Str(s) => Ok(Dyn::Bool(s.is_empty())),
            Dyn::List(l) => Ok(Dyn::Bool(l.borrow().is_empty())),
            Dyn::Map(m) => Ok(Dyn::Bool(m.borrow().is_empty())),
            other => wrong_type(builtin, other),
        },
        B::Has => match &args[0] {
            Dyn::Map(m) => Ok(Dyn::Bool(m.borrow().contains(&key_of(&args[1])?))),
            Dyn::List(l) => {
                budget.charge(l.borrow().len() as u64)?;
                Ok(Dyn::Bool(l.borrow().iter().any(|v| loose_eq(v, &args[1]))))
            }
            Dyn::Str(s) => Ok(Dyn::Bool(s.contains(text_of(&args[1], "substring")?.as_str()))),
            other => wrong_type(builtin, other),
        },
        B::Get => match &args[0] {
            Dyn::Map(m) => {
                let k = key_of(&args[1])?;
                Ok(m.borrow().get(&k).cloned().unwrap_or_else(|| arg(2)))
            }
            Dyn::List(_) | Dyn::Str(_) => ops::index_get(&args[0], &args[1], dialect),
            other => wrong_type(builtin, other),
        },
        B::FindEntry => match &args[0] {
            Dyn::Map(m) => {
                let k = key_of(&args[1])?;
                let m = m.borrow();
                Ok(match m.get(&k) {
                    Some(_) if m.is_set => k.to_dyn(),
                    Some(v) => Dyn::list(vec![k.to_dyn(), v.clone()]),
                    None => Dyn::Null,
                })
            }
            other => wrong_type(builtin, other),
        },
        B::At => ops::index_get(&args[0], &args[1], dialect),
        B::Set => match &args[0] {
            Dyn::Map(m) => {
                let k = key_of(&args[1])?;
                let previous = m.borrow().get(&k).cloned().unwrap_or(Dyn::Null);
                m.borrow_mut().insert(k, args[2].clone());
                budget.check_len(m.borrow().len())?;
                Ok(previous)
            }
            Dyn::List(l) => {
                let len = l.borrow().len();
                let i = resolve_index(&args[1], len, dialect)?;
                let previous = std::mem::replace(&mut l.borrow_mut()[i], args[2].clone());
                Ok(previous)
            }
            other => wrong_type(builtin, other),
        },
        B::Add => match &args[0] {
            Dyn::Map(m) => {
                let k = key_of(&args[1])?;
                let fresh = !m.borrow().contains(&k);
                m.borrow_mut().insert(k, Dyn::Null);
                budget.check_len(m.borrow().len())?;
                Ok(Dyn::Bool(fresh))
            }
            Dyn::List(l) => {
                l.borrow_mut().push(args[1].clone());
                budget.check_len(l.borrow().len())?;
                Ok(Dyn::Bool(true))
            }
            other => wrong_type(builtin, other),
        },
        B::Push => match &args[0] {
            Dyn::List(l) => {
                l.borrow_mut().push(args[1].clone());
                budget.check_len(l.borrow().len())?;
                Ok(Dyn::Null)
            }
            Dyn::Map(m) if m.borrow().is_set => {
                m.borrow_mut().insert(key_of(&args[1])?, Dyn::Null);
                Ok(Dyn::Null)
            }
            other => wrong_type(builtin, other),
        },
        B::Unshift => match &args[0] {
            Dyn::List(l) => {
                budget.charge(l.borrow().len() as u64)?;
                l.borrow_mut().insert(0, args[1].clone());
                budget.check_len(l.borrow().len())?;
                Ok(Dyn::Null)
            }
            other => wrong_type(builtin, other),
        },
        B::Insert => match &args[0] {
            Dyn::List(l) => {
                let len = l.borrow().len() as i64;
                let mut i = int_arg(&args[1], "insert position")?;
                if i < 0 && dialect.negative_index() {
                    i += len;
                }
                let i = if dialect.negative_index() {
                    i.clamp(0, len)
                } else if (0..=len).contains(&i) {
                    i
                } else {
                    return fault(format!("insert position {} out of range for length {}", i, len));
                };
                budget.charge(len as u64)?;
                l.borrow_mut().insert(i as usize, args[2].clone());
                budget.check_len(l.borrow().len())?;
                Ok(Dyn::Null)
            }
            other => wrong_type(builtin, other),
        },
        B::Pop => match &args[0] {
            Dyn::List(l) => {
                if args.len() == 1 {
                    return match l.borrow_mut().pop() {
                        Some(v) => Ok(v),
                        None if dialect == Dialect::CFamily => Ok(Dyn::Null),
                        None => fault("pop from empty list"),
                    };
                }
                let len = l.borrow().len();
                let i = resolve_index(&args[1], len, dialect)?;
                budget.charge(len as u64)?;
                Ok(l.borrow_mut().remove(i))
            }
            Dyn::Map(m) => {
                if args.len() == 1 {
                    let first = m.borrow().first_key();
                    return match first {
                        Some(k) => {
                            m.borrow_mut().remove(&k);
                            Ok(k.to_dyn())
                        }
                        None => fault("pop from an empty set"),
                    };
                }
                let k = key_of(&args[1])?;
                let removed = m.borrow_mut().remove(&k);
                match removed {
                    Some(v) => Ok(v),
                    None if args.len() == 3 => Ok(args[2].clone()),
                    None => fault(format!("key {} not found", args[1].render())),
                }
            }
            other => wrong_type(builtin, other),
        },
        B::Shift => match &args[0] {
            Dyn::List(l) => {
                if l.borrow().is_empty() {
                    return match dialect {
                        Dialect::CFamily => Ok(Dyn::Null),
                        Dialect::Python => fault("pop from an empty deque"),
                    };
                }
                budget.charge(l.borrow().len() as u64)?;
                Ok(l.borrow_mut().remove(0))
            }
            other => wrong_type(builtin, other),
        },
        B::Remove | B::RemoveAt => match &args[0] {
            Dyn::List(l) => {
                let len = l.borrow().len();
                let i = resolve_index(&args[1], len, dialect)?;
                budget.charge(len as u64)?;
                Ok(l.borrow_mut().remove(i))
            }
            Dyn::Map(m) if builtin == B::Remove => {
                let k = key_of(&args[1])?;
                let is_set = m.borrow().is_set;
                let removed = m.borrow_mut().remove(&k);
                Ok(if is_set {
                    Dyn::Bool(removed.is_some())
                } else {
                    removed.unwrap_or(Dyn::Null)
                })
            }
            other => wrong_type(builtin, other),
        },
        B::RemoveValue => match &args[0] {
            Dyn::List(l) => {
                budget.charge(l.borrow().len() as u64)?;
                let position = l.borrow().iter().position(|v| loose_eq(v, &args[1]));
                match position {
                    Some(i) => {
                        l.borrow_mut().remove(i);
                        Ok(Dyn::Null)
                    }
                    None => fault(format!("{} is not in list", args[1].render())),
                }
            }
            Dyn::Map(m) => {
                let k = key_of(&args[1])?;
                m.borrow_mut().remove(&k);
                Ok(Dyn::Null)
            }
            other => wrong_type(builtin, other),
        },
        B::Clear => match &args[0] {
            Dyn::List(l) => {
                l.borrow_mut().clear();
                Ok(Dyn::Null)
            }
            Dyn::Map(m) => {
                m.borrow_mut().clear();
                Ok(Dyn::Null)
            }
            other => wrong_type(builtin, other),
        },
        B::Extend => {
            let items = elements(&args[1], dialect)?;
            budget.charge(items.len() as u64)?;
            match &args[0] {
                Dyn::List(l) => {
                    l.borrow_mut().extend(items);
                    budget.check_len(l.borrow().len())?;
                    Ok(Dyn::Null)
                }
                Dyn::Map(m) => {
                    let is_set = m.borrow().is_set;
                    if !is_set {
                        // `putAll` / `update`: copy entries
                        if let Dyn::Map(src) = &args[1] {
                            let entries = src.borrow().ordered(dialect);
                            for (k, v) in entries {
                                m.borrow_mut().insert(k, v);
                            }
                            return Ok(Dyn::Null);
                        }
                    }
                    for item in items {
                        m.borrow_mut().insert(key_of(&item)?, Dyn::Null);
                    }
                    budget.check_len(m.borrow().len())?;
                    Ok(Dyn::Null)
                }
                other => wrong_type(builtin, other),
            }
        }
        B::First | B::Last => match &args[0] {
            Dyn::List(l) => {
                let l = l.borrow();
                let item = if builtin == B::First { l.first() } else { l.last() };
                Ok(item.cloned().unwrap_or(Dyn::Null))
            }
            Dyn::Map(m) => {
                let m = m.borrow();
                let key = if builtin == B::First { m.first_key() } else { m.last_key() };
                Ok(key.map(|k| k.to_dyn()).unwrap_or(Dyn::Null))
            }
            Dyn::Str(s) => {
                let c = if builtin == B::First { s.chars().next() } else { s.chars().next_back() };
                Ok(c.map(|c| dialect.char_value(c)).unwrap_or(Dyn::Null))
            }
            other => wrong_type(builtin, other),
        },
        B::Keys | B::Values | B::Items => match &args[0] {
            Dyn::Map(m) => {
                let entries = m.borrow().ordered(dialect);
                budget.charge(entries.len() as u64)?;
                Ok(Dyn::list(
                    entries
                        .into_iter()
                        .map(|(k, v)| match builtin {
                            B::Keys => k.to_dyn(),
                            B::Values => v,
                            _ => Dyn::list(vec![k.to_dyn(), v]),
                        })
                        .collect(),
                ))
            }
            other => wrong_type(builtin, other),
        },
        B::Range => {
            let (start, stop, step) = match args.len() {
                1 => (0, int_arg(&args[0], "range bound")?, 1),
                2 => (int_arg(&args[0], "range bound")?, int_arg(&args[1], "range bound")?, 1),
                _ => (
                    int_arg(&args[0], "range bound")?,
                    int_arg(&args[1], "range bound")?,
                    int_arg(&args[2], "range step")?,
                ),
            };
            let values = range_values(start, stop, step, budget)?;
            Ok(Dyn::list(values.into_iter().map(Dyn::Int).collect()))
        }
        B::Enumerate => {
            let start = if args.len() == 2 { int_arg(&args[1], "start")? } else { 0 };
            let items = elements(&args[0], dialect)?;
            budget.charge(items.len() as u64)?;
            Ok(Dyn::list(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| Dyn::list(vec![Dyn::Int(start + i as i64), v]))
                    .collect(),
            ))
        }
        B::Zip => {
            let (a, b) = (elements(&args[0], dialect)?, elements(&args[1], dialect)?);
            budget.charge(a.len().min(b.len()) as u64)?;
            Ok(Dyn::list(
                a.into_iter()
                    .zip(b)
                    .map(|(x, y)| Dyn::list(vec![x, y]))
                    .collect(),
            ))
        }
        B::Fill => {
            let n = int_arg(&args[0], "size")?;
            if n < 0 {
                return fault(format!("negative size {}", n));
            }
            budget.check_len(n as usize)?;
            let weight = match &args[1] {
                Dyn::List(l) => l.borrow().len() as u64 + 1,
                Dyn::Map(m) => m.borrow().len() as u64 + 1,
                _ => 1,
            };
            let mut out = Vec::with_capacity(n as usize);
            for _ in 0..n {
                budget.charge(weight)?;
                out.push(args[1].deep_clone());
            }
            Ok(Dyn::list(out))
        }
        B::FillIn => match &args[0] {
            Dyn::List(l) => {
                budget.charge(l.borrow().len() as u64)?;
                for slot in l.borrow_mut().iter_mut() {
                    *slot = args[1].clone();
                }
                Ok(Dyn::Null)
            }
            other => wrong_type(builtin, other),
        },
        B::Copy => {
            budget.charge(match &args[0] {
                Dyn::List(l) => l.borrow().len() as u64,
                Dyn::Map(m) => m.borrow().len() as u64,
                _ => 1,
            })?;
            Ok(args[0].shallow_clone())
        }
        B::DeepCopy => {
            budget.charge(match &args[0] {
                Dyn::List(l) => l.borrow().len() as u64,
                Dyn::Map(m) => m.borrow().len() as u64,
                _ => 1,
            })?;
            Ok(args[0].deep_clone())
        }
        B::ToList => {
            if args.is_empty() {
                return Ok(Dyn::list(Vec::new()));
            }
            let items = elements(&args[0], dialect)?;
            budget.charge(items.len() as u64)?;
            Ok(Dyn::list(items))
        }
        B::ToSet => {
            let mut set = DynMap::new_set();
            if let Some(source) = args.first() {
                let items = elements(source, dialect)?;
                budget.charge(items.len() as u64)?;
                for item in items {
                    set.insert(key_of(&item)?, Dyn::Null);
                }
            }
            Ok(Dyn::map(set))
        }
        B::NewSet => Ok(Dyn::map(DynMap::new_set())),
        B::NewMap => {
            let mut map = DynMap::new();
            map.default = args.first().cloned();
            Ok(Dyn::map(map))
        }
        B::PutIfAbsent | B::ComputeIfAbsent => match &args[0] {
            Dyn::Map(m) => {
                let k = key_of(&args[1])?;
                let existing = m.borrow().get(&k).cloned();
                match existing {
                    Some(v) if builtin == B::ComputeIfAbsent => Ok(v),
                    Some(v) => Ok(v),
                    None => {
                        m.borrow_mut().insert(k, args[2].clone());
                        budget.check_len(m.borrow().len())?;
                        Ok(if builtin == B::ComputeIfAbsent {
                            args[2].clone()
                        } else {
                            Dyn::Null
                        })
                    }
                }
            }
            other => wrong_type(builtin, other),
        },
        B::MergeAdd => match &args[0] {
            Dyn::Map(m) => {
                let k = key_of(&args[1])?;
                let current = m.borrow().get(&k).cloned();
                let merged = match current {
                    Some(v) => ops::binary(BinaryOp::Add, &v, &args[2], dialect, budget)?,
                    None => args[2].clone(),
                };
                m.borrow_mut().insert(k, merged.clone());
                Ok(merged)
            }
            other => wrong_type(builtin, other),
        },
        B::Min | B::Max => extremum(builtin, &args, dialect),
        B::Abs => match &args[0] {
            Dyn::Float(f) => Ok(Dyn::Float(f.abs())),
            other => {
                let n = int_arg(other, "abs() argument")?;
                n.checked_abs().map(Dyn::Int).map_or_else(|| fault("integer overflow"), Ok)
            }
        },
        B::Sum => {
            let items = elements(&args[0], dialect)?;
            budget.charge(items.len() as u64)?;
            let mut total = if args.len() == 2 { args[1].clone() } else { Dyn::Int(0) };
            for item in items {
                total = ops::binary(BinaryOp::Add, &total, &item, dialect, budget)?;
            }
            Ok(total)
        }
        B::Sqrt => {
            let x = float_arg(&args[0], "sqrt() argument")?;
            if x < 0.0 && dialect == Dialect::Python {
                return fault("math domain error");
            }
            Ok(Dyn::Float(x.sqrt()))
        }
        B::Pow => {
            if dialect.integral_math() {
                if let (Dyn::Int(_), Dyn::Int(_)) = (&args[0], &args[1]) {
                    return ops::binary(BinaryOp::Pow, &args[0], &args[1], dialect, budget);
                }
            }
            let (a, b) = (float_arg(&args[0], "base")?, float_arg(&args[1], "exponent")?);
            Ok(Dyn::Float(a.powf(b)))
        }
        B::Floor | B::Ceil | B::Round => {
            if let Dyn::Int(n) = &args[0] {
                return Ok(if dialect.integral_math() || builtin == B::Round {
                    Dyn::Int(*n)
                } else {
                    Dyn::Float(*n as f64)
                });
            }
            let x = float_arg(&args[0], "argument")?;
            let rounded = match builtin {
                B::Floor => x.floor(),
                B::Ceil => x.ceil(),
                _ if dialect == Dialect::Python => round_half_even(x),
                _ => x.round(),
            };
            if builtin == B::Round || dialect.integral_math() {
                if !rounded.is_finite() || rounded.abs() >= 9.2e18 {
                    return fault("cannot convert float to integer");
                }
                Ok(Dyn::Int(rounded as i64))
            } else {
                Ok(Dyn::Float(rounded))
            }
        }
        B::Log => {
            let x = float_arg(&args[0], "log() argument")?;
            if x <= 0.0 && dialect == Dialect::Python {
                return fault("math domain error");
            }
            Ok(Dyn::Float(match args.get(1) {
                Some(base) => x.ln() / float_arg(base, "log() base")?.ln(),
                None => x.ln(),
            }))
        }
        B::Gcd => {
            let (mut a, mut b) = (
                int_arg(&args[0], "gcd() argument")?.unsigned_abs(),
                int_arg(&args[1], "gcd() argument")?.unsigned_abs(),
            );
            while b != 0 {
                (a, b) = (b, a % b);
            }
            i64::try_from(a).map(Dyn::Int).map_or_else(|_| fault("integer overflow"), Ok)
        }
        B::BitCount => Ok(Dyn::Int(int_arg(&args[0], "bit_count() argument")?.count_ones() as i64)),
        B::Sort => match &args[0] {
            Dyn::List(l) => {
                let descending = args.get(1).is_some_and(Dyn::is_truthy);
                let mut items = l.borrow().clone();
                budget.charge(items.len() as u64 * 4)?;
                sort_values(&mut items, descending)?;
                *l.borrow_mut() = items;
                Ok(Dyn::Null)
            }
            other => wrong_type(builtin, other),
        },
        B::Sorted => {
            let descending = args.get(1).is_some_and(Dyn::is_truthy);
            let mut items = elements(&args[0], dialect)?;
            budget.charge(items.len() as u64 * 4)?;
            sort_values(&mut items, descending)?;
            Ok(Dyn::list(items))
        }
        B::Reverse => match &args[0] {
            Dyn::List(l) => {
                l.borrow_mut().reverse();
                Ok(Dyn::Null)
            }
            other => wrong_type(builtin, other),
        },
        B::Reversed => match &args[0] {
            Dyn::Str(s) => Ok(Dyn::str(&s.chars().rev().collect::<String>())),
            other => {
                let mut items = elements(other, dialect)?;
                items.reverse();
                Ok(Dyn::list(items))
            }
        },
        B::HeapPush => match &args[0] {
            Dyn::List(l) => {
                let max = args.get(2).is_some_and(Dyn::is_truthy);
                let mut heap = l.borrow_mut();
                heap.push(args[1].clone());
                budget.check_len(heap.len())?;
                let last = heap.len() - 1;
                sift_up(&mut heap, last, max)?;
                Ok(Dyn::Null)
            }
            other => wrong_type(builtin, other),
        },
        B::HeapPop => match &args[0] {
            Dyn::List(l) => {
                let max = args.get(1).is_some_and(Dyn::is_truthy);
                let mut heap = l.borrow_mut();
                if heap.is_empty() {
                    return match dialect {
                        Dialect::CFamily => Ok(Dyn::Null),
                        Dialect::Python => fault("index out of range: pop from empty heap"),
                    };
                }
                let last = heap.len() - 1;
                heap.swap(0, last);
                let top = heap.pop().unwrap_or(Dyn::Null);
                sift_down(&mut heap, 0, max)?;
                Ok(top)
            }
            other => wrong_type(builtin, other),
        },
        B::Heapify => match &args[0] {
            Dyn::List(l) => {
                let max = args.get(1).is_some_and(Dyn::is_truthy);
                let mut heap = l.borrow_mut();
                budget.charge(heap.len() as u64)?;
                for i in (0..heap.len() / 2).rev() {
                    sift_down(&mut heap, i, max)?;
                }
                Ok(Dyn::Null)
            }
            other => wrong_type(builtin, other),
        },
        B::Str => Ok(Dyn::str(&match dialect {
            Dialect::Python => python_repr(&args[0]),
            Dialect::CFamily => args[0].render(),
        })),
        B::Int => match &args[0] {
            Dyn::Str(s) => {
                let radix = match args.get(1) {
                    Some(r) => u32::try_from(int_arg(r, "base")?)
                        .ok()
                        .filter(|r| (2..=36).contains(r))
                        .map_or_else(|| fault("int() base must be between 2 and 36"), Ok)?,
                    None => 10,
                };
                parse_int(s, radix).map(Dyn::Int)
            }
            Dyn::Float(f) => {
                if !f.is_finite() || f.abs() >= 9.2e18 {
                    return fault("cannot convert float to integer");
                }
                Ok(Dyn::Int(f.trunc() as i64))
            }
            other => Ok(Dyn::Int(int_arg(other, "int() argument")?)),
        },
        B::Float => match &args[0] {
            Dyn::Str(s) => {
                let t = s.trim();
                let parsed = match t.to_ascii_lowercase().as_str() {
                    "inf" | "+inf" | "infinity" => Some(f64::INFINITY),
                    "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
                    _ => t.parse::<f64>().ok(),
                };
                parsed
                    .map(Dyn::Float)
                    .map_or_else(
                        || fault(format!("could not convert string to float: {:?}", t)),
                        Ok,
                    )
            }
            other => Ok(Dyn::Float(float_arg(other, "float() argument")?)),
        },
        B::Chars => {
            let text = text_of(&args[0], "chars() argument")?;
            budget.charge(text.len() as u64)?;
            Ok(Dyn::list(text.chars().map(|c| dialect.char_value(c)).collect()))
        }
        B::Join => {
            let sep = match args.get(1) {
                Some(s) => text_of(s, "separator")?,
                None => String::new(),
            };
            let items = elements(&args[0], dialect)?;
            budget.charge(items.len() as u64)?;
            let parts: Vec<String> = items.iter().map(Dyn::render).collect();
            let joined = parts.join(&sep);
            budget.check_len(joined.len())?;
            Ok(Dyn::str(&joined))
        }
        B::Split => {
            let text = text_of(&args[0], "split() argument")?;
            let sep = match args.get(1) {
                Some(Dyn::Null) | None => None,
                Some(s) => Some(text_of(s, "separator")?),
            };
            budget.charge(text.len() as u64)?;
            Ok(Dyn::list(split_text(&text, sep.as_deref(), dialect)))
        }
        B::Lower => Ok(text_like(&args[0], text_of(&args[0], "lower() argument")?.to_lowercase())),
        B::Upper => Ok(text_like(&args[0], text_of(&args[0], "upper() argument")?.to_uppercase())),
        B::Trim => Ok(Dyn::str(text_of(&args[0], "trim() argument")?.trim())),
        B::Replace => {
            let text = text_of(&args[0], "replace() argument")?;
            let (from, to) = (text_of(&args[1], "pattern")?, text_of(&args[2], "replacement")?);
            let replaced = if from.is_empty() { text } else { text.replace(&from, &to) };
            budget.check_len(replaced.len())?;
            Ok(Dyn::str(&replaced))
        }
        B::Substring => {
            let chars: Vec<char> = text_of(&args[0], "substring() argument")?.chars().collect();
            let begin = int_arg(&args[1], "begin index")?;
            let end = match args.get(2) {
                Some(e) => int_arg(e, "end index")?,
                None => chars.len() as i64,
            };
            if begin < 0 || end > chars.len() as i64 || begin > end {
                return fault(format!(
                    "begin {}, end {}, length {}",
                    begin,
                    end,
                    chars.len()
                ));
            }
            Ok(Dyn::str(&chars[begin as usize..end as usize].iter().collect::<String>()))
        }
        B::Substr => {
            let chars: Vec<char> = text_of(&args[0], "substr() argument")?.chars().collect();
            let pos = int_arg(&args[1], "position")?;
            if pos < 0 || pos > chars.len() as i64 {
                return fault(format!(
                    "substr position {} out of range for length {}",
                    pos,
                    chars.len()
                ));
            }
            let available = chars.len() - pos as usize;
            let count = match args.get(2) {
                Some(n) => (int_arg(n, "length")?.max(0) as usize).min(available),
                None => available,
            };
            Ok(Dyn::str(&chars[pos as usize..pos as usize + count].iter().collect::<String>()))
        }
        B::IndexOf | B::LastIndexOf => match &args[0] {
            Dyn::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let needle: Vec<char> = text_of(&args[1], "search value")?.chars().collect();
                let from = match args.get(2) {
                    Some(f) => int_arg(f, "start index")?.max(0) as usize,
                    None => 0,
                };
                budget.charge(chars.len() as u64)?;
                let fits = |i: usize| chars.get(i..i + needle.len()) == Some(&needle[..]);
                let found = if builtin == B::IndexOf {
                    (from..=chars.len()).find(|i| fits(*i))
                } else {
                    (0..=chars.len()).rev().find(|i| fits(*i))
                };
                Ok(Dyn::Int(found.map_or(-1, |i| i as i64)))
            }
            Dyn::List(l) => {
                let l = l.borrow();
                budget.charge(l.len() as u64)?;
                let found = if builtin == B::IndexOf {
                    l.iter().position(|v| loose_eq(v, &args[1]))
                } else {
                    l.iter().rposition(|v| loose_eq(v, &args[1]))
                };
                Ok(Dyn::Int(found.map_or(-1, |i| i as i64)))
            }
            other => wrong_type(builtin, other),
        },
        B::StartsWith | B::EndsWith => {
            let text = text_of(&args[0], "string")?;
            let affix = text_of(&args[1], "affix")?;
            Ok(Dyn::Bool(if builtin == B::StartsWith {
                text.starts_with(&affix)
            } else {
                text.ends_with(&affix)
            }))
        }
        B::IsDigit => char_test(&args[0], builtin, |c| c.is_ascii_digit()),
        B::IsAlpha => char_test(&args[0], builtin, char::is_alphabetic),
        B::IsAlnum => char_test(&args[0], builtin, char::is_alphanumeric),
        B::IsUpper => char_test(&args[0], builtin, char::is_uppercase),
        B::IsLower => char_test(&args[0], builtin, char::is_lowercase),
        B::IsSpace => char_test(&args[0], builtin, char::is_whitespace),
        B::Ord => {
            let text = text_of(&args[0], "ord() argument")?;
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Dyn::Int(c as i64)),
                _ => fault(format!(
                    "ord() expected a character, but string of length {} found",
                    text.chars().count()
                )),
            }
        }
        B::Chr => {
            let code = int_arg(&args[0], "chr() argument")?;
            u32::try_from(code)
                .ok()
                .and_then(char::from_u32)
                .map(|c| dialect.char_value(c))
                .map_or_else(|| fault(format!("chr() arg {} not in range", code)), Ok)
        }
        B::Count => match &args[0] {
            Dyn::Str(s) => {
                let needle = text_of(&args[1], "substring")?;
                Ok(Dyn::Int(if needle.is_empty() {
                    s.chars().count() as i64 + 1
                } else {
                    s.matches(needle.as_str()).count() as i64
                }))
            }
            Dyn::List(l) => {
                budget.charge(l.borrow().len() as u64)?;
                Ok(Dyn::Int(l.borrow().iter().filter(|v| loose_eq(v, &args[1])).count() as i64))
            }
            Dyn::Map(m) => Ok(Dyn::Int(m.borrow().contains(&key_of(&args[1])?) as i64)),
            other => wrong_type(builtin, other),
        },
        B::Slice => {
            let step = match args.get(3) {
                Some(Dyn::Null) | None => 1,
                Some(s) => int_arg(s, "slice step")?,
            };
            if step == 0 {
                return fault("slice step cannot be zero");
            }
            let (start, stop) = (arg(1), arg(2));
            match &args[0] {
                Dyn::Str(s) => {
                    let chars: Vec<char> = s.chars().collect();
                    let picked = slice_indices(chars.len(), &start, &stop, step)?;
                    budget.charge(picked.len() as u64)?;
                    Ok(Dyn::str(&picked.into_iter().map(|i| chars[i]).collect::<String>()))
                }
                Dyn::List(l) => {
                    let l = l.borrow();
                    let picked = slice_indices(l.len(), &start, &stop, step)?;
                    budget.charge(picked.len() as u64)?;
                    Ok(Dyn::list(picked.into_iter().map(|i| l[i].clone()).collect()))
                }
                other => wrong_type(builtin, other),
            }
        }
        B::Compare => {
            let ord = compare(&args[0], &args[1]).map_err(Trap::Runtime)?;
            Ok(Dyn::Int(match ord {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            }))
        }
        B::Print => Ok(Dyn::Null),
        B::Any | B::All => {
            let items = elements(&args[0], dialect)?;
            budget.charge(items.len() as u64)?;
            Ok(Dyn::Bool(if builtin == B::Any {
                items.iter().any(Dyn::is_truthy)
            } else {
                items.iter().all(Dyn::is_truthy)
            }))
        }
        B::Fail => match args.first() {
            Some(message) => fault(message.render()),
            None => fault("exception raised"),
        },
    }
}

/// Integers of `range(start, stop, step)`, bounded by the collection limit
pub fn range_values(
    start: i64,
    stop: i64,
    step: i64,
    budget: &mut Budget,
) -> Result<Vec<i64>, Trap> {
    if step == 0 {
        return fault("range() arg 3 must not be zero");
    }
    let span = if step > 0 {
        (stop.saturating_sub(start)).max(0) as u128
    } else {
        (start.saturating_sub(stop)).max(0) as u128
    };
    let count = span.div_ceil(step.unsigned_abs() as u128);
    budget.check_len(usize::try_from(count).unwrap_or(usize::MAX))?;
    budget.charge(count as u64)?;
    let mut out = Vec::with_capacity(count as usize);
    let mut i = start;
    for _ in 0..count {
        out.push(i);
        i = i.saturating_add(step);
    }
    Ok(out)
}

fn round_half_even(x: f64) -> f64 {
    let r = x.round();
    if (x - x.trunc()).abs() == 0.5 && r % 2.0 != 0.0 {
        r - x.signum()
    } else {
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn budget() -> Budget {
        Budget::new(
            Instant::now() + Duration::from_secs(5),
            Arc::new(AtomicBool::new(false)),
            10_000,
        )
    }

    fn call_py(builtin: Builtin, args: Vec<Dyn>) -> Result<Dyn, Trap> {
        call(builtin, args, Dialect::Python, &mut budget())
    }

    fn call_c(builtin: Builtin, args: Vec<Dyn>) -> Result<Dyn, Trap> {
        call(builtin, args, Dialect::CFamily, &mut budget())
    }

    fn ints(values: &[i64]) -> Dyn {
        Dyn::list(values.iter().map(|n| Dyn::Int(*n)).collect())
    }

    #[test]
    fn test_name_table() {
        assert_eq!(Builtin::from_name("heap_push"), Some(Builtin::HeapPush));
        assert_eq!(Builtin::HeapPush.name(), "heap_push");
        assert_eq!(Builtin::from_name("eval"), None);
        assert_eq!(Builtin::Min.arity(), (1, VARIADIC));
    }

    #[test]
    fn test_fill_makes_independent_rows() {
        let grid = call_c(Builtin::Fill, vec![Dyn::Int(2), ints(&[0, 0])]).unwrap();
        if let Dyn::List(rows) = &grid {
            if let Dyn::List(first) = &rows.borrow()[0] {
                first.borrow_mut()[0] = Dyn::Int(7);
            }
        }
        assert_eq!(grid.render(), "[[7, 0], [0, 0]]");
    }

    #[test]
    fn test_collection_limit() {
        let result = call_py(Builtin::Range, vec![Dyn::Int(1_000_000)]);
        assert!(matches!(result, Err(Trap::Runtime(msg)) if msg.contains("maximum length")));
    }

    #[test]
    fn test_heap_order() {
        let heap = Dyn::list(vec![]);
        let mut b = budget();
        for n in [5, 1, 4, 2] {
            let args = vec![heap.clone(), Dyn::Int(n)];
            call(Builtin::HeapPush, args, Dialect::Python, &mut b).unwrap();
        }
        let mut popped = Vec::new();
        for _ in 0..4 {
            let top = call(Builtin::HeapPop, vec![heap.clone()], Dialect::Python, &mut b).unwrap();
            popped.push(top.render());
        }
        assert_eq!(popped, vec!["1", "2", "4", "5"]);

        let max_heap = ints(&[3, 9, 1]);
        let args = vec![max_heap.clone(), Dyn::Bool(true)];
        call(Builtin::Heapify, args, Dialect::CFamily, &mut b).unwrap();
        let top = call(Builtin::First, vec![max_heap], Dialect::CFamily, &mut b);
        assert!(matches!(top, Ok(Dyn::Int(9))));
    }

    #[test]
    fn test_slice_semantics() {
        let s = Dyn::str("abcdef");
        let args = vec![s.clone(), Dyn::Null, Dyn::Null, Dyn::Int(-1)];
        let reversed = call_py(Builtin::Slice, args).unwrap();
        assert_eq!(reversed.render(), "fedcba");
        let middle = call_py(Builtin::Slice, vec![s.clone(), Dyn::Int(1), Dyn::Int(-1)]).unwrap();
        assert_eq!(middle.render(), "bcde");
        let args = vec![ints(&[1, 2, 3]), Dyn::Int(2), Dyn::Int(99)];
        let clipped = call_py(Builtin::Slice, args).unwrap();
        assert_eq!(clipped.render(), "[3]");
    }

    #[test]
    fn test_slice_with_huge_step_stops_at_first_element() {
        let s = Dyn::str("abc");
        let args = vec![s.clone(), Dyn::Int(1), Dyn::Null, Dyn::Int(i64::MAX)];
        let forward = call_py(Builtin::Slice, args).unwrap();
        assert_eq!(forward.render(), "b");
        let args = vec![ints(&[1, 2, 3]), Dyn::Null, Dyn::Null, Dyn::Int(i64::MIN)];
        let backward = call_py(Builtin::Slice, args).unwrap();
        assert_eq!(backward.render(), "[3]");
    }

    #[test]
    fn test_find_entry() {
        let m = call_c(Builtin::NewMap, vec![]).unwrap();
        call_c(Builtin::Set, vec![m.clone(), Dyn::Int(4), Dyn::Int(1)]).unwrap();
        let found = call_c(Builtin::FindEntry, vec![m.clone(), Dyn::Int(4)]).unwrap();
        assert_eq!(found.render(), "[4, 1]");
        assert!(matches!(call_c(Builtin::FindEntry, vec![m, Dyn::Int(5)]), Ok(Dyn::Null)));
    }

    #[test]
    fn test_substring_bounds() {
        let hello = |a: i64, b: i64| vec![Dyn::str("hello"), Dyn::Int(a), Dyn::Int(b)];
        assert_eq!(call_c(Builtin::Substring, hello(1, 3)).unwrap().render(), "el");
        assert!(call_c(Builtin::Substring, hello(3, 9)).is_err());
        assert_eq!(call_c(Builtin::Substr, hello(3, 9)).unwrap().render(), "lo");
    }

    #[test]
    fn test_split_by_dialect() {
        let java = call_c(Builtin::Split, vec![Dyn::str("a,b,,"), Dyn::str(",")]).unwrap();
        assert_eq!(java.render(), "[a, b]");
        let python = call_py(Builtin::Split, vec![Dyn::str("a,b,,"), Dyn::str(",")]).unwrap();
        assert_eq!(python.render(), "[a, b, , ]");
        let words = call_c(Builtin::Split, vec![Dyn::str(" x  y "), Dyn::str("\\s+")]).unwrap();
        assert_eq!(words.render(), "[x, y]");
    }

    #[test]
    fn test_chars_by_dialect() {
        let c = call_c(Builtin::Chars, vec![Dyn::str("ab")]).unwrap();
        assert!(matches!(&c, Dyn::List(l) if matches!(l.borrow()[0], Dyn::Char('a'))));
        let py = call_py(Builtin::Chars, vec![Dyn::str("ab")]).unwrap();
        let Dyn::List(chars) = &py else {
            panic!("expected a list");
        };
        assert!(matches!(&chars.borrow()[0], Dyn::Str(s) if &**s == "a"));
    }

    #[test]
    fn test_rounding_and_conversion() {
        assert!(matches!(call_py(Builtin::Round, vec![Dyn::Float(2.5)]), Ok(Dyn::Int(2))));
        assert!(matches!(call_c(Builtin::Round, vec![Dyn::Float(2.5)]), Ok(Dyn::Int(3))));
        assert!(matches!(call_py(Builtin::Floor, vec![Dyn::Float(-1.5)]), Ok(Dyn::Int(-2))));
        let floored = call_c(Builtin::Floor, vec![Dyn::Float(-1.5)]);
        assert!(matches!(floored, Ok(Dyn::Float(f)) if f == -2.0));
        assert!(matches!(call_py(Builtin::Int, vec![Dyn::str(" 42 ")]), Ok(Dyn::Int(42))));
        assert!(matches!(call_c(Builtin::Int, vec![Dyn::Char('a')]), Ok(Dyn::Int(97))));
        assert!(call_py(Builtin::Int, vec![Dyn::str("4x")]).is_err());
    }

    #[test]
    fn test_map_helpers() {
        let map = call_py(Builtin::NewMap, vec![]).unwrap();
        let mut b = budget();
        for _ in 0..2 {
            let args = vec![map.clone(), Dyn::str("a"), Dyn::Int(1)];
            call(Builtin::MergeAdd, args, Dialect::CFamily, &mut b).unwrap();
        }
        assert!(matches!(
            call(Builtin::Get, vec![map.clone(), Dyn::str("a")], Dialect::CFamily, &mut b),
            Ok(Dyn::Int(2))
        ));
        assert!(matches!(
            call(
                Builtin::Get,
                vec![map.clone(), Dyn::str("z"), Dyn::Int(0)],
                Dialect::CFamily,
                &mut b
            ),
            Ok(Dyn::Int(0))
        ));
        let bucket = call(
            Builtin::ComputeIfAbsent,
            vec![map.clone(), Dyn::str("b"), Dyn::list(vec![])],
            Dialect::CFamily,
            &mut b,
        )
        .unwrap();
        call(Builtin::Push, vec![bucket, Dyn::Int(3)], Dialect::CFamily, &mut b).unwrap();
        assert_eq!(map.render(), "{a: 2, b: [3]}");
    }

    #[test]
    fn test_extremum_and_sum() {
        assert!(matches!(call_py(Builtin::Max, vec![ints(&[3, 8, 1])]), Ok(Dyn::Int(8))));
        assert!(matches!(call_py(Builtin::Min, vec![Dyn::Int(3), Dyn::Int(-2)]), Ok(Dyn::Int(-2))));
        assert!(call_py(Builtin::Max, vec![ints(&[])]).is_err());
        assert!(matches!(call_py(Builtin::Sum, vec![ints(&[1, 2, 3])]), Ok(Dyn::Int(6))));
    }

    #[test]
    fn test_remove_variants() {
        let list = ints(&[5, 6, 7]);
        let removed = call_c(Builtin::Remove, vec![list.clone(), Dyn::Int(0)]);
        assert!(matches!(removed, Ok(Dyn::Int(5))));
        call_py(Builtin::RemoveValue, vec![list.clone(), Dyn::Int(7)]).unwrap();
        assert_eq!(list.render(), "[6]");
        assert!(call_py(Builtin::RemoveValue, vec![list, Dyn::Int(9)]).is_err());
    }
}
