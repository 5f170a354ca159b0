//! Variable assignment
//!
//! [`Values`] maps keys to manifold elements of a closed set of kinds.
//! Variables are never mutated in place: `retract` builds a new assignment and
//! `update` swaps a whole value.

use crate::core::{CoreError, CoreResult, Key, Ordering};
use crate::manifold::{LieGroup, Point2, Point3, SE3, SO3, SO4};
use nalgebra::{DVector, Vector2, Vector3};
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;

/// Kind tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Rot3,
    Rot4,
    Pose3,
    Point2,
    Point3,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Rot3 => "SO3",
            ValueKind::Rot4 => "SO4",
            ValueKind::Pose3 => "SE3",
            ValueKind::Point2 => "Point2",
            ValueKind::Point3 => "Point3",
        };
        write!(f, "{name}")
    }
}

/// One variable of the assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Rot3(SO3),
    Rot4(SO4),
    Pose3(SE3),
    Point2(Point2),
    Point3(Point3),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Rot3(_) => ValueKind::Rot3,
            Value::Rot4(_) => ValueKind::Rot4,
            Value::Pose3(_) => ValueKind::Pose3,
            Value::Point2(_) => ValueKind::Point2,
            Value::Point3(_) => ValueKind::Point3,
        }
    }

    /// Tangent-space dimension.
    pub fn dim(&self) -> usize {
        match self {
            Value::Rot3(_) => SO3::DOF,
            Value::Rot4(_) => SO4::DOF,
            Value::Pose3(_) => SE3::DOF,
            Value::Point2(_) => Point2::DOF,
            Value::Point3(_) => Point3::DOF,
        }
    }

    /// Move the value along its chart.
    pub fn retract(&self, delta: &[f64]) -> CoreResult<Value> {
        Ok(match self {
            Value::Rot3(v) => Value::Rot3(v.retract_slice(delta)?),
            Value::Rot4(v) => Value::Rot4(v.retract_slice(delta)?),
            Value::Pose3(v) => Value::Pose3(v.retract_slice(delta)?),
            Value::Point2(v) => Value::Point2(v.retract_slice(delta)?),
            Value::Point3(v) => Value::Point3(v.retract_slice(delta)?),
        })
    }

    /// Chart coordinates of `other` around `self`.
    pub fn local(&self, other: &Value, key: Key) -> CoreResult<DVector<f64>> {
        let mismatch = || CoreError::TypeMismatch {
            key,
            expected: self.kind(),
            actual: other.kind(),
        };
        Ok(match (self, other) {
            (Value::Rot3(a), Value::Rot3(b)) => a.local_vector(b)?,
            (Value::Rot4(a), Value::Rot4(b)) => a.local_vector(b)?,
            (Value::Pose3(a), Value::Pose3(b)) => a.local_vector(b)?,
            (Value::Point2(a), Value::Point2(b)) => a.local_vector(b)?,
            (Value::Point3(a), Value::Point3(b)) => a.local_vector(b)?,
            _ => return Err(mismatch()),
        })
    }

    pub fn is_approx(&self, other: &Value, tolerance: f64) -> bool {
        match (self, other) {
            (Value::Rot3(a), Value::Rot3(b)) => a.is_approx(b, tolerance),
            (Value::Rot4(a), Value::Rot4(b)) => a.is_approx(b, tolerance),
            (Value::Pose3(a), Value::Pose3(b)) => a.is_approx(b, tolerance),
            (Value::Point2(a), Value::Point2(b)) => a.is_approx(b, tolerance),
            (Value::Point3(a), Value::Point3(b)) => a.is_approx(b, tolerance),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Rot3(v) => write!(f, "{v}"),
            Value::Rot4(v) => write!(f, "{v}"),
            Value::Pose3(v) => write!(f, "{v}"),
            Value::Point2(v) => write!(f, "{v}"),
            Value::Point3(v) => write!(f, "{v}"),
        }
    }
}

/// Lie groups that can be stored in [`Values`].
pub trait ValueType: LieGroup {
    const KIND: ValueKind;

    fn from_value(value: &Value) -> Option<&Self>;

    fn into_value(self) -> Value;
}

macro_rules! impl_value_type {
    ($ty:ty, $variant:ident) => {
        impl ValueType for $ty {
            const KIND: ValueKind = ValueKind::$variant;

            fn from_value(value: &Value) -> Option<&Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }

        impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::$variant(value)
            }
        }
    };
}

impl_value_type!(SO3, Rot3);
impl_value_type!(SO4, Rot4);
impl_value_type!(SE3, Pose3);
impl_value_type!(Point2, Point2);
impl_value_type!(Point3, Point3);

/// Assignment of manifold values to keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values {
    values: BTreeMap<Key, Value>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new variable. Fails if the key is already present.
    pub fn insert(&mut self, key: Key, value: impl Into<Value>) -> CoreResult<()> {
        match self.values.entry(key) {
            btree_map::Entry::Occupied(_) => Err(CoreError::DuplicateKey { key }),
            btree_map::Entry::Vacant(slot) => {
                slot.insert(value.into());
                Ok(())
            }
        }
    }

    /// Replace an existing variable with a value of the same kind.
    pub fn update(&mut self, key: Key, value: impl Into<Value>) -> CoreResult<()> {
        let value = value.into();
        let slot = self
            .values
            .get_mut(&key)
            .ok_or(CoreError::MissingVariable { key })?;
        if slot.kind() != value.kind() {
            return Err(CoreError::TypeMismatch {
                key,
                expected: slot.kind(),
                actual: value.kind(),
            });
        }
        *slot = value;
        Ok(())
    }

    pub fn get(&self, key: Key) -> CoreResult<&Value> {
        self.values
            .get(&key)
            .ok_or(CoreError::MissingVariable { key })
    }

    /// Typed access to a variable.
    pub fn get_as<G: ValueType>(&self, key: Key) -> CoreResult<&G> {
        let value = self.get(key)?;
        G::from_value(value).ok_or(CoreError::TypeMismatch {
            key,
            expected: G::KIND,
            actual: value.kind(),
        })
    }

    pub fn pose3(&self, key: Key) -> CoreResult<&SE3> {
        self.get_as(key)
    }

    pub fn rot4(&self, key: Key) -> CoreResult<&SO4> {
        self.get_as(key)
    }

    pub fn rot3(&self, key: Key) -> CoreResult<&SO3> {
        self.get_as(key)
    }

    pub fn point2(&self, key: Key) -> CoreResult<&Point2> {
        self.get_as(key)
    }

    pub fn point3(&self, key: Key) -> CoreResult<&Point3> {
        self.get_as(key)
    }

    pub fn contains(&self, key: Key) -> bool {
        self.values.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.values.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Key, &Value)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Total tangent-space dimension.
    pub fn dim(&self) -> usize {
        self.values.values().map(Value::dim).sum()
    }

    /// Sub-assignment with only `keys`.
    pub fn restrict(&self, keys: &[Key]) -> CoreResult<Values> {
        let mut restricted = Values::new();
        for &key in keys {
            restricted.values.insert(key, self.get(key)?.clone());
        }
        Ok(restricted)
    }

    /// Retract every variable that has a delta. The others are copied.
    pub fn retract(&self, delta: &VectorValues) -> CoreResult<Values> {
        let mut values = BTreeMap::new();
        for (&key, value) in &self.values {
            let moved = match delta.get(key) {
                Some(d) => value.retract(d.as_slice())?,
                None => value.clone(),
            };
            values.insert(key, moved);
        }
        for key in delta.keys() {
            if !self.values.contains_key(&key) {
                return Err(CoreError::MissingVariable { key });
            }
        }
        Ok(Values { values })
    }

    /// Copy of the assignment with a single variable retracted.
    pub fn retract_key(&self, key: Key, delta: &[f64]) -> CoreResult<Values> {
        let moved = self.get(key)?.retract(delta)?;
        let mut values = self.clone();
        values.values.insert(key, moved);
        Ok(values)
    }

    /// Per-key chart coordinates of `other` around `self`.
    pub fn local_coordinates(&self, other: &Values) -> CoreResult<VectorValues> {
        let mut delta = VectorValues::new();
        for (&key, value) in &self.values {
            delta.insert(key, value.local(other.get(key)?, key)?);
        }
        Ok(delta)
    }

    /// Same keys and every value within `tolerance`.
    pub fn is_approx(&self, other: &Values, tolerance: f64) -> bool {
        self.len() == other.len()
            && self.values.iter().all(|(key, value)| {
                other
                    .values
                    .get(key)
                    .is_some_and(|o| value.is_approx(o, tolerance))
            })
    }
}

impl fmt::Display for Values {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Values with {} variables:", self.len())?;
        for (key, value) in &self.values {
            writeln!(f, "  {key}: {value}")?;
        }
        Ok(())
    }
}

/// Convenience constructors for robot-and-landmark problems.
pub trait ValuesExt {
    /// Insert a pose given its rotation rows and translation.
    fn add_robot_pose(
        &mut self,
        key: Key,
        rotation: &nalgebra::Matrix3<f64>,
        translation: Vector3<f64>,
    ) -> CoreResult<()>;

    /// Insert a planar landmark.
    fn add_landmark(&mut self, key: Key, x: f64, y: f64) -> CoreResult<()>;
}

impl ValuesExt for Values {
    fn add_robot_pose(
        &mut self,
        key: Key,
        rotation: &nalgebra::Matrix3<f64>,
        translation: Vector3<f64>,
    ) -> CoreResult<()> {
        self.insert(key, SE3::from_rotation_translation(rotation, translation))
    }

    fn add_landmark(&mut self, key: Key, x: f64, y: f64) -> CoreResult<()> {
        self.insert(key, Point2::new(Vector2::new(x, y)))
    }
}

/// Tangent-space deltas, one vector per key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorValues {
    vectors: BTreeMap<Key, DVector<f64>>,
}

impl VectorValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a stacked vector according to `ordering` and the variable dimensions.
    pub fn from_ordered(
        stacked: &DVector<f64>,
        ordering: &Ordering,
        values: &Values,
    ) -> CoreResult<VectorValues> {
        let mut vectors = BTreeMap::new();
        let mut offset = 0;
        for key in ordering.iter() {
            let dim = values.get(key)?.dim();
            if offset + dim > stacked.len() {
                return Err(CoreError::DimensionMismatch {
                    expected: offset + dim,
                    actual: stacked.len(),
                });
            }
            vectors.insert(key, stacked.rows(offset, dim).into_owned());
            offset += dim;
        }
        if offset != stacked.len() {
            return Err(CoreError::DimensionMismatch {
                expected: offset,
                actual: stacked.len(),
            });
        }
        Ok(VectorValues { vectors })
    }

    pub fn insert(&mut self, key: Key, vector: DVector<f64>) {
        self.vectors.insert(key, vector);
    }

    pub fn get(&self, key: Key) -> Option<&DVector<f64>> {
        self.vectors.get(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.vectors.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Euclidean norm of all deltas stacked together.
    pub fn norm(&self) -> f64 {
        self.vectors
            .values()
            .map(|v| v.norm_squared())
            .sum::<f64>()
            .sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::key::{l, x};
    use nalgebra::{Matrix3, dvector};

    #[test]
    fn test_insert_rejects_duplicates() -> Result<(), Box<dyn std::error::Error>> {
        let mut values = Values::new();
        values.insert(x(1), SE3::identity())?;
        assert_eq!(
            values.insert(x(1), SE3::identity()),
            Err(CoreError::DuplicateKey { key: x(1) })
        );
        Ok(())
    }

    #[test]
    fn test_typed_access() -> Result<(), Box<dyn std::error::Error>> {
        let mut values = Values::new();
        values.add_landmark(l(1), 2.0, 5.0)?;
        assert_eq!(values.point2(l(1))?, &Point2::from_xy(2.0, 5.0));
        assert_eq!(
            values.pose3(l(1)),
            Err(CoreError::TypeMismatch {
                key: l(1),
                expected: ValueKind::Pose3,
                actual: ValueKind::Point2
            })
        );
        assert_eq!(
            values.get(x(9)),
            Err(CoreError::MissingVariable { key: x(9) })
        );
        Ok(())
    }

    #[test]
    fn test_update_requires_existing_key_of_same_kind() -> Result<(), Box<dyn std::error::Error>> {
        let mut values = Values::new();
        values.add_landmark(l(1), 0.0, 0.0)?;
        values.update(l(1), Point2::from_xy(1.0, 1.0))?;
        assert!(values.update(l(1), SE3::identity()).is_err());
        assert!(values.update(l(2), Point2::from_xy(1.0, 1.0)).is_err());
        Ok(())
    }

    #[test]
    fn test_retract_and_local_coordinates() -> Result<(), Box<dyn std::error::Error>> {
        let mut values = Values::new();
        values.add_robot_pose(x(1), &Matrix3::identity(), Vector3::zeros())?;
        values.add_landmark(l(1), 2.0, 5.0)?;
        assert_eq!(values.dim(), 8);

        let mut delta = VectorValues::new();
        delta.insert(x(1), dvector![0.1, 0.0, 0.0, 0.0, 0.0, 0.05]);
        delta.insert(l(1), dvector![-1.0, 1.0]);
        let moved = values.retract(&delta)?;
        let back = values.local_coordinates(&moved)?;
        for key in [x(1), l(1)] {
            let (a, b) = (back.get(key), delta.get(key));
            assert!(a.zip(b).is_some_and(|(a, b)| (a - b).norm() < 1e-12));
        }
        assert!((back.norm() - delta.norm()).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_from_ordered_splits_by_dimension() -> Result<(), Box<dyn std::error::Error>> {
        let mut values = Values::new();
        values.add_landmark(l(1), 0.0, 0.0)?;
        values.insert(x(1), SE3::identity())?;
        let ordering = Ordering::from_keys([x(1), l(1)])?;
        let stacked = DVector::from_fn(8, |i, _| i as f64);
        let split = VectorValues::from_ordered(&stacked, &ordering, &values)?;
        assert_eq!(split.get(x(1)).map(|v| v.len()), Some(6));
        assert_eq!(split.get(l(1)), Some(&dvector![6.0, 7.0]));
        assert!(VectorValues::from_ordered(&DVector::zeros(7), &ordering, &values).is_err());
        Ok(())
    }
}
