//! Flattening of loosely-typed JSON attribute arrays into typed buffers.
//!
//! The model server emits every vertex attribute as a plain JSON array. Some
//! attributes are scalar lists (`[0, 1, 2]`), others are lists of rows
//! (`[[x, y, z], ...]`). [`flatten`] turns either shape into a contiguous
//! buffer plus an item size, the same way a typed array backs a GPU buffer
//! attribute.

use anyhow::{Result, bail};
use serde_json::Value;

/// A flat, typed attribute buffer with a fixed number of components per item.
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute<T> {
    pub array: Vec<T>,
    pub item_size: usize,
}

impl<T: Element> Attribute<T> {
    pub fn new(array: Vec<T>, item_size: usize) -> Self {
        Self { array, item_size }
    }

    /// Number of items (vertices, indices, ...) stored in the buffer.
    pub fn count(&self) -> usize {
        if self.item_size == 0 {
            0
        } else {
            self.array.len() / self.item_size
        }
    }

    pub fn item(&self, index: usize) -> Option<&[T]> {
        let start = index.checked_mul(self.item_size)?;
        self.array.get(start..start + self.item_size)
    }

    /// Component `component` of item `index`, or `None` when either is out of range.
    pub fn component(&self, index: usize, component: usize) -> Option<T> {
        if component >= self.item_size {
            return None;
        }
        self.item(index).map(|item| item[component])
    }
}

/// Element types an attribute buffer can hold.
///
/// Conversion follows typed-array store semantics: floats round to the
/// nearest representable value, integers truncate toward zero and wrap.
pub trait Element: Copy + Default + std::fmt::Debug + bytemuck::Pod {
    const NAME: &'static str;

    fn from_number(number: f64) -> Self;
}

impl Element for f32 {
    const NAME: &'static str = "f32";

    fn from_number(number: f64) -> Self {
        number as f32
    }
}

impl Element for u8 {
    const NAME: &'static str = "u8";

    fn from_number(number: f64) -> Self {
        wrap_integer(number, 256.0) as u8
    }
}

impl Element for u16 {
    const NAME: &'static str = "u16";

    fn from_number(number: f64) -> Self {
        wrap_integer(number, 65536.0) as u16
    }
}

fn wrap_integer(number: f64, modulus: f64) -> f64 {
    if !number.is_finite() {
        return 0.0;
    }
    number.trunc().rem_euclid(modulus)
}

fn convert<T: Element>(value: &Value) -> Result<T> {
    match value {
        Value::Number(number) => match number.as_f64() {
            Some(n) => Ok(T::from_number(n)),
            None => bail!("number {} cannot be represented as {}", number, T::NAME),
        },
        Value::Null => Ok(T::default()),
        Value::Bool(flag) => Ok(T::from_number(if *flag { 1.0 } else { 0.0 })),
        other => bail!("expected a number for a {} attribute, found {}", T::NAME, other),
    }
}

/// Flatten a JSON attribute into a typed buffer.
///
/// Returns `Ok(None)` when the attribute should not be attached at all: the
/// value is missing or not an array, the array is empty, its first element is
/// `null`, or its first element is an empty row.
///
/// The first element decides the shape. A scalar first element yields item
/// size 1; a row of length `n` yields item size `n` and every following row is
/// padded with zeros or truncated to `n` components.
pub fn flatten<T: Element>(value: Option<&Value>) -> Result<Option<Attribute<T>>> {
    let elements = match value {
        Some(Value::Array(elements)) => elements,
        _ => return Ok(None),
    };
    let first = match elements.first() {
        None | Some(Value::Null) => return Ok(None),
        Some(first) => first,
    };

    let Value::Array(first_row) = first else {
        let array = elements
            .iter()
            .enumerate()
            .map(|(idx, element)| match element {
                Value::Array(_) => bail!("element {idx} is a row but the attribute is scalar"),
                element => convert(element),
            })
            .collect::<Result<Vec<T>>>()?;
        return Ok(Some(Attribute::new(array, 1)));
    };

    let item_size = first_row.len();
    if item_size == 0 {
        return Ok(None);
    }

    let mut array = Vec::with_capacity(elements.len() * item_size);
    let mut ragged_rows = 0;
    for (idx, element) in elements.iter().enumerate() {
        let Value::Array(row) = element else {
            bail!("element {idx} is not a row of {item_size} components");
        };
        if row.len() != item_size {
            ragged_rows += 1;
        }
        for component in 0..item_size {
            let value = match row.get(component) {
                Some(value) => convert(value)?,
                None => T::default(),
            };
            array.push(value);
        }
    }
    if ragged_rows > 0 {
        log::warn!(
            "{ragged_rows} of {} rows do not have {item_size} components and were padded or truncated",
            elements.len()
        );
    }

    Ok(Some(Attribute::new(array, item_size)))
}
