//! In-memory representation of a gridded dataset.
//!
//! A [`Dataset`] is a collection of named [`Variable`]s sharing a set of named dimensions,
//! loosely following the netCDF/CF data model:
//!
//! - *data variables* hold the physical fields (e.g. `tas`, `pr`)
//! - *coordinates* hold numeric coordinate values (`lon`, `lat`, `x`, `y`, `height`, ...)
//! - an optional [`TimeCoordinate`] holds the calendar-aware time axis
//! - global attributes describe the dataset as a whole
//!
//! Dimension lengths are not stored separately; they are derived from the variables and
//! must be consistent across them.
//!
//! # Example
//!
//! ```rust
//! use atlas_core::dataset::{Dataset, Variable};
//! use ndarray::ArrayD;
//! use ndarray::IxDyn;
//!
//! let mut ds = Dataset::new();
//! ds.insert_coord("lon", Variable::from_1d("lon", vec![0.0, 1.0, 2.0])).unwrap();
//! ds.insert_coord("lat", Variable::from_1d("lat", vec![10.0, 11.0])).unwrap();
//! let data = ArrayD::from_elem(IxDyn(&[2, 3]), 1.0);
//! ds.insert_data_var("tas", Variable::new(vec!["lat", "lon"], data).unwrap()).unwrap();
//!
//! assert_eq!(ds.dim_len("lon"), Some(3));
//! assert_eq!(ds.data_var_names(), vec!["tas"]);
//! ```

use crate::errors::{AtlasError, AtlasResult};
use crate::time::{Calendar, TimeAxis};
use ndarray::{Array1, ArrayD, Axis, Dimension, IxDyn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Number(f64),
    Text(String),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            AttrValue::Number(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Number(v) => Some(*v),
            AttrValue::Text(_) => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Number(v) => write!(f, "{v}"),
            AttrValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Number(value)
    }
}

/// Attribute map of a variable or dataset
pub type Attributes = BTreeMap<String, AttrValue>;

/// On-disk encoding hints that must survive processing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Encoding {
    pub fill_value: Option<f64>,
    pub missing_value: Option<f64>,
}

/// A named-dimension array with metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    dims: Vec<String>,
    data: ArrayD<f64>,
    pub attrs: Attributes,
    pub encoding: Encoding,
}

impl Variable {
    /// Create a variable, checking that one name is given per array axis.
    pub fn new<S: Into<String>>(dims: Vec<S>, data: ArrayD<f64>) -> AtlasResult<Self> {
        let dims: Vec<String> = dims.into_iter().map(Into::into).collect();
        if dims.len() != data.ndim() {
            return Err(AtlasError::Shape(format!(
                "{} dimension names given for an array with {} axes",
                dims.len(),
                data.ndim()
            )));
        }
        let unique: BTreeSet<&String> = dims.iter().collect();
        if unique.len() != dims.len() {
            return Err(AtlasError::Shape(format!("repeated dimension in {dims:?}")));
        }
        Ok(Self {
            dims,
            data,
            attrs: Attributes::new(),
            encoding: Encoding::default(),
        })
    }

    /// A zero-dimensional variable
    pub fn scalar(value: f64) -> Self {
        Self {
            dims: vec![],
            data: ArrayD::from_elem(IxDyn(&[]), value),
            attrs: Attributes::new(),
            encoding: Encoding::default(),
        }
    }

    /// A one-dimensional variable along `dim`
    pub fn from_1d(dim: &str, values: Vec<f64>) -> Self {
        Self {
            dims: vec![dim.to_string()],
            data: Array1::from(values).into_dyn(),
            attrs: Attributes::new(),
            encoding: Encoding::default(),
        }
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut ArrayD<f64> {
        &mut self.data
    }

    pub fn into_data(self) -> ArrayD<f64> {
        self.data
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn axis_of(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }

    pub fn has_dim(&self, dim: &str) -> bool {
        self.axis_of(dim).is_some()
    }

    pub fn len_of(&self, dim: &str) -> Option<usize> {
        self.axis_of(dim).map(|axis| self.data.shape()[axis])
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(AttrValue::as_str)
    }

    pub fn set_attr(&mut self, key: &str, value: impl Into<AttrValue>) {
        self.attrs.insert(key.to_string(), value.into());
    }

    /// Values of a one-dimensional variable
    pub fn values_1d(&self) -> Option<Vec<f64>> {
        (self.ndim() == 1).then(|| self.data.iter().copied().collect())
    }

    pub fn min(&self) -> f64 {
        self.data
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.data
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn map_inplace(&mut self, f: impl Fn(f64) -> f64) {
        self.data.mapv_inplace(f);
    }

    fn rename_dims(&mut self, mapping: &BTreeMap<String, String>) {
        for dim in self.dims.iter_mut() {
            if let Some(new) = mapping.get(dim) {
                *dim = new.clone();
            }
        }
    }

    /// Gather positions along `dim`; `None` positions are filled with NaN.
    pub fn take_along(&self, dim: &str, indices: &[Option<usize>]) -> AtlasResult<Self> {
        let axis = self
            .axis_of(dim)
            .ok_or_else(|| AtlasError::Shape(format!("variable has no dimension '{dim}'")))?;
        let length = self.data.shape()[axis];
        let mut shape = self.data.shape().to_vec();
        shape[axis] = indices.len();
        let mut out = ArrayD::from_elem(IxDyn(&shape), f64::NAN);
        for (target, source) in indices.iter().enumerate() {
            if let Some(source) = source {
                if *source >= length {
                    return Err(AtlasError::Shape(format!(
                        "index {source} out of bounds for dimension '{dim}' of length {length}"
                    )));
                }
                out.index_axis_mut(Axis(axis), target)
                    .assign(&self.data.index_axis(Axis(axis), *source));
            }
        }
        Ok(Self {
            dims: self.dims.clone(),
            data: out,
            attrs: self.attrs.clone(),
            encoding: self.encoding.clone(),
        })
    }

    /// Reduce groups of positions along `dim` into single values.
    pub fn reduce_groups(
        &self,
        dim: &str,
        groups: &[Vec<usize>],
        reducer: &dyn Fn(&[f64]) -> f64,
    ) -> AtlasResult<Self> {
        let axis = self
            .axis_of(dim)
            .ok_or_else(|| AtlasError::Shape(format!("variable has no dimension '{dim}'")))?;
        let mut shape = self.data.shape().to_vec();
        shape[axis] = groups.len();
        let mut out = ArrayD::from_elem(IxDyn(&shape), f64::NAN);
        let mut buffer = Vec::new();
        for (target, group) in groups.iter().enumerate() {
            let views: Vec<_> = group
                .iter()
                .map(|i| self.data.index_axis(Axis(axis), *i))
                .collect();
            for (position, value) in out.index_axis_mut(Axis(axis), target).indexed_iter_mut() {
                buffer.clear();
                buffer.extend(views.iter().map(|view| view[position.slice()]));
                *value = reducer(&buffer);
            }
        }
        Ok(Self {
            dims: self.dims.clone(),
            data: out,
            attrs: self.attrs.clone(),
            encoding: self.encoding.clone(),
        })
    }

    /// Reorder the axes to follow `order`, which must be a permutation of the dimensions.
    pub fn transpose(&self, order: &[&str]) -> AtlasResult<Self> {
        if order.len() != self.dims.len() {
            return Err(AtlasError::Shape(format!(
                "cannot transpose {:?} to {order:?}",
                self.dims
            )));
        }
        let permutation = order
            .iter()
            .map(|d| {
                self.axis_of(d).ok_or_else(|| {
                    AtlasError::Shape(format!("cannot transpose {:?} to {order:?}", self.dims))
                })
            })
            .collect::<AtlasResult<Vec<_>>>()?;
        let data = self
            .data
            .clone()
            .permuted_axes(permutation.as_slice())
            .as_standard_layout()
            .into_owned();
        Ok(Self {
            dims: order.iter().map(|d| d.to_string()).collect(),
            data,
            attrs: self.attrs.clone(),
            encoding: self.encoding.clone(),
        })
    }

    /// Drop a length-one dimension.
    pub fn squeeze(&self, dim: &str) -> AtlasResult<Self> {
        let axis = self
            .axis_of(dim)
            .ok_or_else(|| AtlasError::Shape(format!("variable has no dimension '{dim}'")))?;
        if self.data.shape()[axis] != 1 {
            return Err(AtlasError::Shape(format!(
                "cannot squeeze dimension '{dim}' of length {}",
                self.data.shape()[axis]
            )));
        }
        let mut dims = self.dims.clone();
        dims.remove(axis);
        Ok(Self {
            dims,
            data: self.data.clone().index_axis_move(Axis(axis), 0),
            attrs: self.attrs.clone(),
            encoding: self.encoding.clone(),
        })
    }
}

/// The time coordinate of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeCoordinate {
    pub name: String,
    pub axis: TimeAxis,
    pub attrs: Attributes,
}

impl TimeCoordinate {
    pub fn new(name: &str, axis: TimeAxis) -> Self {
        let mut attrs = Attributes::new();
        attrs.insert("calendar".to_string(), axis.calendar().name().into());
        Self {
            name: name.to_string(),
            axis,
            attrs,
        }
    }

    pub fn calendar(&self) -> Calendar {
        self.axis.calendar()
    }
}

/// A collection of variables sharing named dimensions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    data_vars: BTreeMap<String, Variable>,
    coords: BTreeMap<String, Variable>,
    time: Option<TimeCoordinate>,
    pub attrs: Attributes,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Length of every dimension used by the dataset.
    pub fn dims(&self) -> BTreeMap<String, usize> {
        let mut dims = BTreeMap::new();
        if let Some(time) = &self.time {
            dims.insert(time.name.clone(), time.axis.len());
        }
        for variable in self.coords.values().chain(self.data_vars.values()) {
            for (dim, len) in variable.dims.iter().zip(variable.shape()) {
                dims.entry(dim.clone()).or_insert(*len);
            }
        }
        dims
    }

    pub fn dim_len(&self, dim: &str) -> Option<usize> {
        self.dims().get(dim).copied()
    }

    pub fn has_dim(&self, dim: &str) -> bool {
        self.dim_len(dim).is_some()
    }

    /// Whether `name` is a coordinate (numeric or time).
    pub fn has_coord(&self, name: &str) -> bool {
        self.coords.contains_key(name) || self.time.as_ref().is_some_and(|t| t.name == name)
    }

    /// Whether `name` is any variable of the dataset.
    pub fn contains(&self, name: &str) -> bool {
        self.has_coord(name) || self.data_vars.contains_key(name)
    }

    fn check_dims(&self, name: &str, variable: &Variable) -> AtlasResult<()> {
        let dims = self.dims();
        for (dim, len) in variable.dims.iter().zip(variable.shape()) {
            if let Some(existing) = dims.get(dim) {
                if existing != len {
                    return Err(AtlasError::Shape(format!(
                        "variable '{name}' has length {len} along '{dim}', dataset has {existing}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Insert or replace a data variable.
    pub fn insert_data_var(&mut self, name: &str, variable: Variable) -> AtlasResult<()> {
        let previous = self.data_vars.remove(name);
        if let Err(err) = self.check_dims(name, &variable) {
            if let Some(previous) = previous {
                self.data_vars.insert(name.to_string(), previous);
            }
            return Err(err);
        }
        self.data_vars.insert(name.to_string(), variable);
        Ok(())
    }

    /// Insert or replace a numeric coordinate.
    pub fn insert_coord(&mut self, name: &str, variable: Variable) -> AtlasResult<()> {
        let previous = self.coords.remove(name);
        if let Err(err) = self.check_dims(name, &variable) {
            if let Some(previous) = previous {
                self.coords.insert(name.to_string(), previous);
            }
            return Err(err);
        }
        self.coords.insert(name.to_string(), variable);
        Ok(())
    }

    pub fn set_time(&mut self, time: TimeCoordinate) -> AtlasResult<()> {
        let expected = time.axis.len();
        for (name, variable) in self.coords.iter().chain(self.data_vars.iter()) {
            if let Some(len) = variable.len_of(&time.name) {
                if len != expected {
                    return Err(AtlasError::Shape(format!(
                        "variable '{name}' has length {len} along '{}', time axis has {expected}",
                        time.name
                    )));
                }
            }
        }
        self.time = Some(time);
        Ok(())
    }

    pub fn time(&self) -> Option<&TimeCoordinate> {
        self.time.as_ref()
    }

    pub fn time_mut(&mut self) -> Option<&mut TimeCoordinate> {
        self.time.as_mut()
    }

    /// The time axis, failing if the dataset has none.
    pub fn time_axis(&self) -> AtlasResult<&TimeAxis> {
        self.time
            .as_ref()
            .map(|t| &t.axis)
            .ok_or_else(|| AtlasError::InvalidTime("dataset has no time coordinate".to_string()))
    }

    pub fn data_var(&self, name: &str) -> Option<&Variable> {
        self.data_vars.get(name)
    }

    pub fn data_var_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.data_vars.get_mut(name)
    }

    pub fn coord(&self, name: &str) -> Option<&Variable> {
        self.coords.get(name)
    }

    pub fn coord_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.coords.get_mut(name)
    }

    pub fn remove_data_var(&mut self, name: &str) -> Option<Variable> {
        self.data_vars.remove(name)
    }

    pub fn remove_coord(&mut self, name: &str) -> Option<Variable> {
        self.coords.remove(name)
    }

    pub fn data_vars(&self) -> impl Iterator<Item = (&String, &Variable)> {
        self.data_vars.iter()
    }

    pub fn coords(&self) -> impl Iterator<Item = (&String, &Variable)> {
        self.coords.iter()
    }

    pub fn data_var_names(&self) -> Vec<&str> {
        self.data_vars.keys().map(String::as_str).collect()
    }

    /// Names of all coordinates, including the time coordinate.
    pub fn coord_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.coords.keys().map(String::as_str).collect();
        if let Some(time) = &self.time {
            names.push(time.name.as_str());
        }
        names.sort_unstable();
        names
    }

    /// Rename dimensions, coordinates and data variables in one go.
    ///
    /// Fails when two distinct names would end up with the same name.
    pub fn rename(&self, mapping: &BTreeMap<String, String>) -> AtlasResult<Self> {
        let rename_key = |key: &String| mapping.get(key).unwrap_or(key).clone();
        let mut names: BTreeSet<String> = self.dims().into_keys().collect();
        names.extend(self.data_vars.keys().cloned());
        names.extend(self.coords.keys().cloned());
        names.extend(self.time.iter().map(|time| time.name.clone()));
        let mut renamed: BTreeMap<String, &String> = BTreeMap::new();
        for name in &names {
            if let Some(previous) = renamed.insert(rename_key(name), name) {
                return Err(AtlasError::Shape(format!(
                    "renaming '{previous}' and '{name}' would both give '{}'",
                    rename_key(name)
                )));
            }
        }
        let rename_all = |variables: &BTreeMap<String, Variable>| {
            variables
                .iter()
                .map(|(name, variable)| {
                    let mut variable = variable.clone();
                    variable.rename_dims(mapping);
                    (rename_key(name), variable)
                })
                .collect::<BTreeMap<_, _>>()
        };
        Ok(Self {
            data_vars: rename_all(&self.data_vars),
            coords: rename_all(&self.coords),
            time: self.time.as_ref().map(|time| TimeCoordinate {
                name: rename_key(&time.name),
                ..time.clone()
            }),
            attrs: self.attrs.clone(),
        })
    }

    /// Rename a data variable without touching dimensions.
    pub fn rename_data_var(&mut self, from: &str, to: &str) -> AtlasResult<()> {
        let variable = self
            .data_vars
            .remove(from)
            .ok_or_else(|| AtlasError::MissingVariable(from.to_string()))?;
        self.data_vars.insert(to.to_string(), variable);
        Ok(())
    }

    fn map_variables_with_dim(
        &self,
        dim: &str,
        f: impl Fn(&Variable) -> AtlasResult<Variable>,
    ) -> AtlasResult<(BTreeMap<String, Variable>, BTreeMap<String, Variable>)> {
        let apply = |variables: &BTreeMap<String, Variable>| {
            variables
                .iter()
                .map(|(name, variable)| {
                    let variable = if variable.has_dim(dim) {
                        f(variable)?
                    } else {
                        variable.clone()
                    };
                    Ok((name.clone(), variable))
                })
                .collect::<AtlasResult<BTreeMap<_, _>>>()
        };
        Ok((apply(&self.data_vars)?, apply(&self.coords)?))
    }

    /// Gather positions along any non-time dimension.
    pub fn take_along(&self, dim: &str, indices: &[Option<usize>]) -> AtlasResult<Self> {
        let (data_vars, coords) = self.map_variables_with_dim(dim, |v| v.take_along(dim, indices))?;
        Ok(Self {
            data_vars,
            coords,
            time: self.time.clone(),
            attrs: self.attrs.clone(),
        })
    }

    /// Gather positions along the time dimension and install `axis` as the new time axis.
    pub fn take_time(&self, indices: &[Option<usize>], axis: TimeAxis) -> AtlasResult<Self> {
        let time = self
            .time
            .as_ref()
            .ok_or_else(|| AtlasError::InvalidTime("dataset has no time coordinate".to_string()))?;
        if indices.len() != axis.len() {
            return Err(AtlasError::Shape(format!(
                "{} indices for a time axis of length {}",
                indices.len(),
                axis.len()
            )));
        }
        let (data_vars, coords) =
            self.map_variables_with_dim(&time.name, |v| v.take_along(&time.name, indices))?;
        Ok(Self {
            data_vars,
            coords,
            time: Some(TimeCoordinate {
                axis,
                ..time.clone()
            }),
            attrs: self.attrs.clone(),
        })
    }

    /// Collapse groups of time steps with `reducer` and install `axis` as the new time axis.
    pub fn reduce_time(
        &self,
        groups: &[Vec<usize>],
        axis: TimeAxis,
        reducer: &dyn Fn(&[f64]) -> f64,
    ) -> AtlasResult<Self> {
        let time = self
            .time
            .as_ref()
            .ok_or_else(|| AtlasError::InvalidTime("dataset has no time coordinate".to_string()))?;
        if groups.len() != axis.len() {
            return Err(AtlasError::Shape(format!(
                "{} groups for a time axis of length {}",
                groups.len(),
                axis.len()
            )));
        }
        let (data_vars, coords) = self
            .map_variables_with_dim(&time.name, |v| v.reduce_groups(&time.name, groups, reducer))?;
        Ok(Self {
            data_vars,
            coords,
            time: Some(TimeCoordinate {
                axis,
                ..time.clone()
            }),
            attrs: self.attrs.clone(),
        })
    }

    /// Drop a length-one dimension from every variable.
    pub fn squeeze(&self, dim: &str) -> AtlasResult<Self> {
        let (data_vars, coords) = self.map_variables_with_dim(dim, |v| v.squeeze(dim))?;
        Ok(Self {
            data_vars,
            coords,
            time: self.time.clone(),
            attrs: self.attrs.clone(),
        })
    }

    /// Sort the dataset by a one-dimensional coordinate in ascending order.
    pub fn sort_by_coord(&self, name: &str) -> AtlasResult<Self> {
        let coord = self
            .coords
            .get(name)
            .ok_or_else(|| AtlasError::MissingVariable(name.to_string()))?;
        let (Some(values), [dim]) = (coord.values_1d(), coord.dims()) else {
            return Err(AtlasError::Shape(format!(
                "cannot sort by coordinate '{name}' with dimensions {:?}",
                coord.dims()
            )));
        };
        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|a, b| values[*a].total_cmp(&values[*b]));
        if order.iter().enumerate().all(|(i, j)| i == *j) {
            return Ok(self.clone());
        }
        let indices: Vec<Option<usize>> = order.into_iter().map(Some).collect();
        self.take_along(dim, &indices)
    }

    /// Transpose a data variable in place.
    pub fn transpose_data_var(&mut self, name: &str, order: &[&str]) -> AtlasResult<()> {
        let variable = self
            .data_vars
            .get(name)
            .ok_or_else(|| AtlasError::MissingVariable(name.to_string()))?;
        let transposed = variable.transpose(order)?;
        self.data_vars.insert(name.to_string(), transposed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::CfDatetime;
    use ndarray::{array, Array3};

    fn sample() -> Dataset {
        let mut ds = Dataset::new();
        let axis = TimeAxis::new(
            (1..=3).map(|d| CfDatetime::ymd(2000, 1, d)).collect(),
            Calendar::Standard,
        );
        ds.set_time(TimeCoordinate::new("time", axis)).unwrap();
        ds.insert_coord("lon", Variable::from_1d("lon", vec![20.0, 10.0]))
            .unwrap();
        ds.insert_coord("lat", Variable::from_1d("lat", vec![0.0])).unwrap();
        let data = Array3::from_shape_fn((3, 1, 2), |(t, _, x)| (t * 10 + x) as f64);
        ds.insert_data_var(
            "tas",
            Variable::new(vec!["time", "lat", "lon"], data.into_dyn()).unwrap(),
        )
        .unwrap();
        ds
    }

    #[test]
    fn test_dims_are_derived() {
        let ds = sample();
        let dims = ds.dims();
        assert_eq!(dims["time"], 3);
        assert_eq!(dims["lon"], 2);
        assert_eq!(dims["lat"], 1);
    }

    #[test]
    fn test_inconsistent_lengths_rejected() {
        let mut ds = sample();
        let result = ds.insert_coord("lon", Variable::from_1d("lon", vec![1.0, 2.0, 3.0]));
        // Replacing the coordinate itself is checked against the data variable
        assert!(matches!(result, Err(AtlasError::Shape(_))));
        assert_eq!(ds.coord("lon").unwrap().values_1d().unwrap(), vec![20.0, 10.0]);
    }

    #[test]
    fn test_variable_needs_one_name_per_axis() {
        let result = Variable::new(vec!["x"], array![[1.0, 2.0]].into_dyn());
        assert!(result.is_err());
    }

    #[test]
    fn test_rename_touches_dims_and_keys() {
        let ds = sample();
        let mapping = BTreeMap::from([
            ("lon".to_string(), "x".to_string()),
            ("time".to_string(), "t".to_string()),
        ]);
        let renamed = ds.rename(&mapping).unwrap();
        assert!(renamed.coord("x").is_some());
        assert_eq!(renamed.data_var("tas").unwrap().dims(), &["t", "lat", "x"]);
        assert_eq!(renamed.time().unwrap().name, "t");
    }

    #[test]
    fn test_rename_collision_is_rejected() {
        let ds = sample();
        let mapping = BTreeMap::from([("lon".to_string(), "lat".to_string())]);
        assert!(matches!(ds.rename(&mapping), Err(AtlasError::Shape(_))));

        // Swapping two names is not a collision
        let mapping = BTreeMap::from([
            ("lon".to_string(), "lat".to_string()),
            ("lat".to_string(), "lon".to_string()),
        ]);
        let swapped = ds.rename(&mapping).unwrap();
        assert_eq!(swapped.data_var("tas").unwrap().dims(), &["time", "lon", "lat"]);
    }

    #[test]
    fn test_sort_by_coord_reorders_data() {
        let ds = sample().sort_by_coord("lon").unwrap();
        assert_eq!(ds.coord("lon").unwrap().values_1d().unwrap(), vec![10.0, 20.0]);
        let tas = ds.data_var("tas").unwrap().data();
        assert_eq!(tas[[0, 0, 0]], 1.0);
        assert_eq!(tas[[0, 0, 1]], 0.0);
    }

    #[test]
    fn test_take_time_fills_gaps_with_nan() {
        let ds = sample();
        let axis = TimeAxis::new(
            (1..=4).map(|d| CfDatetime::ymd(2000, 1, d)).collect(),
            Calendar::Standard,
        );
        let taken = ds
            .take_time(&[None, Some(0), Some(1), Some(1)], axis)
            .unwrap();
        let tas = taken.data_var("tas").unwrap().data();
        assert!(tas[[0, 0, 0]].is_nan());
        assert_eq!(tas[[3, 0, 1]], 11.0);
        assert_eq!(taken.time_axis().unwrap().len(), 4);
    }

    #[test]
    fn test_reduce_time_groups() {
        let ds = sample();
        let axis = TimeAxis::new(vec![CfDatetime::ymd(2000, 1, 1)], Calendar::Standard);
        let reduced = ds
            .reduce_time(&[vec![0, 1, 2]], axis, &|values: &[f64]| {
                values.iter().sum::<f64>() / values.len() as f64
            })
            .unwrap();
        let tas = reduced.data_var("tas").unwrap().data();
        assert_eq!(tas.shape(), &[1, 1, 2]);
        assert_eq!(tas[[0, 0, 1]], 11.0);
    }

    #[test]
    fn test_transpose_and_squeeze() {
        let ds = sample();
        let tas = ds.data_var("tas").unwrap();
        let transposed = tas.transpose(&["lon", "lat", "time"]).unwrap();
        assert_eq!(transposed.shape(), &[2, 1, 3]);
        assert_eq!(transposed.data()[[1, 0, 2]], 21.0);

        let squeezed = ds.squeeze("lat").unwrap();
        assert_eq!(squeezed.data_var("tas").unwrap().dims(), &["time", "lon"]);
        assert!(ds.squeeze("lon").is_err());
    }
}
