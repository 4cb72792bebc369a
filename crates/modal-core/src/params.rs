#![forbid(unsafe_code)]

//! Modal parameters, custom props, and identity hashing.
//!
//! Every window carries effective [`ModalParams`], produced by layering
//! [`ParamsPatch`]es over the built-in defaults:
//!
//! ```text
//! built-in defaults  <-  controller default_params  <-  caller patch
//! ```
//!
//! # Canonical form
//!
//! Params are compared structurally through a canonical JSON string:
//!
//! - object keys are sorted, so insertion order never matters;
//! - callbacks serialize as their name, never by reference;
//! - a field whose value is an object already on the current serialization
//!   path (a reference cycle) is omitted;
//! - non-finite floats serialize as `null`.
//!
//! Producing the canonical form never panics and always terminates.
//!
//! # Deprecated flags
//!
//! `fork` and `weak` exist only on [`ParamsPatch`] and are consumed by the
//! controller while merging. Effective params never carry them.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use ahash::RandomState;
use serde::Serialize;
use serde_json::{Map, Number, Value, json};

/// Default accessibility label for windows that do not set one.
pub const DEFAULT_LABEL: &str = "Content is unknown. Bad guy didn't set a label.";

/// Fixed seeds so identity hashes are reproducible within and across runs.
const IDENTITY_SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

// ---------------------------------------------------------------------------
// ParamId
// ---------------------------------------------------------------------------

/// Caller-supplied correlation key used by `close_by_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum ParamId {
    Int(i64),
    Str(String),
}

impl Default for ParamId {
    fn default() -> Self {
        Self::Int(-1)
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ParamId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ParamId {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for ParamId {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for ParamId {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

// ---------------------------------------------------------------------------
// Callback
// ---------------------------------------------------------------------------

/// A named function embedded in props.
///
/// Two callbacks compare equal when their names match, so a handler
/// recreated on every render does not change a window's identity.
#[derive(Clone)]
pub struct Callback {
    name: Rc<str>,
    func: Rc<dyn Fn(&PropValue)>,
}

impl Callback {
    /// Create a callback. `name` is what the canonical form records.
    pub fn new(name: impl Into<Rc<str>>, func: impl Fn(&PropValue) + 'static) -> Self {
        Self {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    /// The callback's serialized name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the callback.
    pub fn call(&self, arg: &PropValue) {
        (self.func)(arg);
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({})", self.name)
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

// ---------------------------------------------------------------------------
// PropValue / PropObject
// ---------------------------------------------------------------------------

type ObjectCell = RefCell<BTreeMap<String, PropValue>>;

/// A shared, mutable string-keyed object. Clones alias the same storage,
/// which is how self-referencing structures can be built.
#[derive(Clone, Default)]
pub struct PropObject(Rc<ObjectCell>);

impl PropObject {
    /// Create an empty object.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a field.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<PropValue>) {
        self.0.borrow_mut().insert(key.into(), value.into());
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Clone of the field value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<PropValue> {
        self.0.borrow().get(key).cloned()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Whether the object has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Whether both handles alias the same storage.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn as_ptr(&self) -> *const ObjectCell {
        Rc::as_ptr(&self.0)
    }
}

impl fmt::Debug for PropObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut path = Vec::new();
        write!(f, "PropObject({})", object_to_json(self, &mut path))
    }
}

/// A single prop value.
#[derive(Clone)]
pub enum PropValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<PropValue>),
    Object(PropObject),
    Callback(Callback),
}

impl PropValue {
    /// Canonical JSON for this value.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut path = Vec::new();
        value_to_json(self, &mut path).unwrap_or(Value::Null)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        self.to_json() == other.to_json()
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<PropObject> for PropValue {
    fn from(value: PropObject) -> Self {
        Self::Object(value)
    }
}

impl From<Callback> for PropValue {
    fn from(value: Callback) -> Self {
        Self::Callback(value)
    }
}

impl<T: Into<PropValue>> From<Vec<T>> for PropValue {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl From<Value> for PropValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Self::Str(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                let object = PropObject::new();
                for (key, value) in map {
                    object.insert(key, Self::from(value));
                }
                Self::Object(object)
            }
        }
    }
}

/// `None` means "omit this field": the value closes a reference cycle.
fn value_to_json(value: &PropValue, path: &mut Vec<*const ObjectCell>) -> Option<Value> {
    match value {
        PropValue::Null => Some(Value::Null),
        PropValue::Bool(b) => Some(Value::Bool(*b)),
        PropValue::Int(n) => Some(Value::from(*n)),
        PropValue::Float(x) => Some(float_to_json(*x)),
        PropValue::Str(s) => Some(Value::String(s.clone())),
        PropValue::List(items) => Some(Value::Array(
            items
                .iter()
                .map(|item| value_to_json(item, path).unwrap_or(Value::Null))
                .collect(),
        )),
        PropValue::Object(object) => {
            if path.contains(&object.as_ptr()) {
                return None;
            }
            Some(object_to_json(object, path))
        }
        PropValue::Callback(callback) => Some(Value::String(callback.name().to_owned())),
    }
}

/// Whole floats in `i64` range share the integer form, so `1.0` and `1`
/// compare equal. Non-finite values become `null`.
fn float_to_json(x: f64) -> Value {
    const BOUND: f64 = 9_223_372_036_854_775_808.0;
    if x.is_finite() && x.fract() == 0.0 && (-BOUND..BOUND).contains(&x) {
        #[allow(clippy::cast_possible_truncation)]
        return Value::from(x as i64);
    }
    Number::from_f64(x).map_or(Value::Null, Value::Number)
}

fn object_to_json(object: &PropObject, path: &mut Vec<*const ObjectCell>) -> Value {
    path.push(object.as_ptr());
    let fields = object.0.borrow();
    let mut out = Map::new();
    for (key, value) in fields.iter() {
        if let Some(json) = value_to_json(value, path) {
            out.insert(key.clone(), json);
        }
    }
    path.pop();
    Value::Object(out)
}

// ---------------------------------------------------------------------------
// Props
// ---------------------------------------------------------------------------

/// Caller-specific props bag attached to a window.
#[derive(Clone, Default)]
pub struct Props(BTreeMap<String, PropValue>);

impl Props {
    /// Create an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or overwrite a prop.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropValue>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overlay `other` on top of `self`, key by key.
    pub fn merge(&mut self, other: &Props) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Canonical JSON object for the bag.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut path = Vec::new();
        let mut out = Map::new();
        for (key, value) in &self.0 {
            if let Some(json) = value_to_json(value, &mut path) {
                out.insert(key.clone(), json);
            }
        }
        Value::Object(out)
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl PartialEq for Props {
    fn eq(&self, other: &Self) -> bool {
        self.to_json() == other.to_json()
    }
}

impl From<Value> for Props {
    /// Non-object values yield an empty bag.
    fn from(value: Value) -> Self {
        let mut props = Self::new();
        if let Value::Object(map) = value {
            for (key, value) in map {
                props.insert(key, PropValue::from(value));
            }
        }
        props
    }
}

impl<K: Into<String>, V: Into<PropValue>> FromIterator<(K, V)> for Props {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = Self::new();
        for (key, value) in iter {
            props.insert(key, value);
        }
        props
    }
}

// ---------------------------------------------------------------------------
// ModalParams / ParamsPatch
// ---------------------------------------------------------------------------

/// Effective parameters of a window.
#[derive(Debug, Clone, PartialEq)]
pub struct ModalParams {
    /// Correlation key; not the window's identity hash.
    pub id: ParamId,
    /// Whether built-in dismissal (overlay click) is allowed.
    pub closable: bool,
    /// Stacking layer. One focused window per layer.
    pub layer: i32,
    /// Accessibility label.
    pub label: String,
    /// Advisory: keep this window mounted while newer windows cover it.
    pub keep_mounted: bool,
    /// Custom props.
    pub props: Props,
}

impl Default for ModalParams {
    fn default() -> Self {
        Self {
            id: ParamId::default(),
            closable: true,
            layer: 0,
            label: DEFAULT_LABEL.to_owned(),
            keep_mounted: false,
            props: Props::new(),
        }
    }
}

impl ModalParams {
    /// Overlay every field set in `patch`.
    pub fn apply(&mut self, patch: &ParamsPatch) {
        if let Some(id) = &patch.id {
            self.id = id.clone();
        }
        if let Some(closable) = patch.closable {
            self.closable = closable;
        }
        if let Some(layer) = patch.layer {
            self.layer = layer;
        }
        if let Some(label) = &patch.label {
            self.label = label.clone();
        }
        if let Some(keep_mounted) = patch.keep_mounted {
            self.keep_mounted = keep_mounted;
        }
        self.props.merge(&patch.props);
    }

    /// Canonical JSON of all effective params.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "closable": self.closable,
            "layer": self.layer,
            "label": self.label,
            "keepMounted": self.keep_mounted,
            "props": self.props.to_json(),
        })
    }

    /// Canonical string used for structural comparison and hashing.
    #[must_use]
    pub fn canonical(&self) -> String {
        self.to_json().to_string()
    }

    /// Convenience accessor for a custom prop.
    #[must_use]
    pub fn prop(&self, key: &str) -> Option<&PropValue> {
        self.props.get(key)
    }
}

/// Partial params supplied by a caller or by controller configuration.
#[derive(Debug, Clone, Default)]
pub struct ParamsPatch {
    pub id: Option<ParamId>,
    pub closable: Option<bool>,
    pub layer: Option<i32>,
    pub label: Option<String>,
    pub keep_mounted: Option<bool>,
    pub props: Props,
    fork: bool,
    weak: bool,
}

impl ParamsPatch {
    /// An empty patch (all defaults).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn id(mut self, id: impl Into<ParamId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn closable(mut self, closable: bool) -> Self {
        self.closable = Some(closable);
        self
    }

    #[must_use]
    pub fn layer(mut self, layer: i32) -> Self {
        self.layer = Some(layer);
        self
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn keep_mounted(mut self, keep_mounted: bool) -> Self {
        self.keep_mounted = Some(keep_mounted);
        self
    }

    /// Set a custom prop.
    #[must_use]
    pub fn prop(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.props.insert(key, value);
        self
    }

    /// Replace all custom props.
    #[must_use]
    pub fn props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    /// Open as an independent overlay one layer above everything present.
    #[deprecated(note = "set an explicit `layer` instead")]
    #[must_use]
    pub fn fork(mut self, fork: bool) -> Self {
        self.fork = fork;
        self
    }

    /// Has no effect; give windows distinct `id`s to keep them apart.
    #[deprecated(note = "use distinct `id` values instead")]
    #[must_use]
    pub fn weak(mut self, weak: bool) -> Self {
        self.weak = weak;
        self
    }

    pub(crate) fn is_fork(&self) -> bool {
        self.fork
    }

    pub(crate) fn is_weak(&self) -> bool {
        self.weak
    }
}

impl From<Props> for ParamsPatch {
    fn from(props: Props) -> Self {
        Self::new().props(props)
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Deterministic fingerprint of `(component key, canonical params)`.
#[must_use]
pub fn identity_hash(component_key: u64, canonical_params: &str) -> u64 {
    let [k0, k1, k2, k3] = IDENTITY_SEEDS;
    RandomState::with_seeds(k0, k1, k2, k3).hash_one((component_key, canonical_params))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let params = ModalParams::default();
        assert_eq!(params.id, ParamId::Int(-1));
        assert!(params.closable);
        assert_eq!(params.layer, 0);
        assert!(!params.keep_mounted);
        assert_eq!(params.label, DEFAULT_LABEL);
        assert!(params.props.is_empty());
    }

    #[test]
    fn patch_overrides_only_set_fields() {
        let mut params = ModalParams::default();
        params.apply(&ParamsPatch::new().closable(false).prop("x", 1));
        params.apply(&ParamsPatch::new().label("Confirm").prop("y", 2));

        assert!(!params.closable);
        assert_eq!(params.label, "Confirm");
        assert_eq!(params.prop("x").and_then(PropValue::as_i64), Some(1));
        assert_eq!(params.prop("y").and_then(PropValue::as_i64), Some(2));
    }

    #[test]
    fn key_order_does_not_change_canonical_form() {
        let a: Props = [("b", 1), ("a", 2)].into_iter().collect();
        let b: Props = [("a", 2), ("b", 1)].into_iter().collect();
        assert_eq!(a.to_json().to_string(), b.to_json().to_string());
        assert_eq!(a, b);
    }

    #[test]
    fn self_reference_is_dropped_from_canonical_form() {
        let object = PropObject::new().with("b", 1);
        object.insert("a", object.clone());

        let value = PropValue::Object(object);
        assert_eq!(value.to_json().to_string(), r#"{"b":1}"#);
        assert_eq!(format!("{value:?}"), r#"{"b":1}"#);
    }

    #[test]
    fn indirect_cycle_is_dropped_at_closing_edge() {
        let outer = PropObject::new().with("name", "outer");
        let inner = PropObject::new().with("name", "inner");
        inner.insert("parent", outer.clone());
        outer.insert("child", inner);

        let json = PropValue::Object(outer).to_json().to_string();
        assert_eq!(json, r#"{"child":{"name":"inner"},"name":"outer"}"#);
    }

    #[test]
    fn shared_non_cyclic_object_is_kept_twice() {
        let shared = PropObject::new().with("v", 1);
        let props = Props::new().with("a", shared.clone()).with("b", shared);
        assert_eq!(props.to_json().to_string(), r#"{"a":{"v":1},"b":{"v":1}}"#);
    }

    #[test]
    fn callbacks_compare_by_name() {
        let a = Props::new().with("onConfirm", Callback::new("confirm", |_| {}));
        let b = Props::new().with("onConfirm", Callback::new("confirm", |_| {}));
        let c = Props::new().with("onConfirm", Callback::new("other", |_| {}));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn callback_is_invocable() {
        let seen = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&seen);
        let cb = Callback::new("record", move |v| *sink.borrow_mut() = v.as_str().map(str::to_owned));
        cb.call(&PropValue::from("hi"));
        assert_eq!(seen.borrow().as_deref(), Some("hi"));
    }

    #[test]
    fn int_and_whole_float_share_canonical_form() {
        let int = Props::new().with("x", 1);
        let float = Props::new().with("x", 1.0);
        assert_eq!(int.to_json().to_string(), r#"{"x":1}"#);
        assert_eq!(float.to_json().to_string(), r#"{"x":1}"#);
        assert_eq!(int, float);

        let negative_zero = Props::new().with("x", -0.0);
        assert_eq!(negative_zero.to_json().to_string(), r#"{"x":0}"#);
        assert_ne!(Props::new().with("x", 1.5), int);
    }

    #[test]
    fn non_finite_float_serializes_as_null() {
        let props = Props::new().with("x", f64::NAN);
        assert_eq!(props.to_json().to_string(), r#"{"x":null}"#);
    }

    #[test]
    fn from_json_value_round_trips_structure() {
        let props = Props::from(serde_json::json!({ "title": "Hi", "n": [1, 2] }));
        assert_eq!(props.get("title").and_then(PropValue::as_str), Some("Hi"));
        assert_eq!(props.to_json(), serde_json::json!({ "n": [1, 2], "title": "Hi" }));
    }

    #[test]
    fn param_id_serializes_untagged() {
        let mut params = ModalParams::default();
        params.id = ParamId::from("dialog");
        assert_eq!(params.to_json()["id"], serde_json::json!("dialog"));
        params.id = ParamId::from(7);
        assert_eq!(params.to_json()["id"], serde_json::json!(7));
    }

    #[test]
    fn identity_hash_is_deterministic_and_discriminating() {
        let p1 = ModalParams::default().canonical();
        let mut changed = ModalParams::default();
        changed.id = ParamId::from(2);
        let p2 = changed.canonical();

        assert_eq!(identity_hash(1, &p1), identity_hash(1, &p1));
        assert_ne!(identity_hash(1, &p1), identity_hash(1, &p2));
        assert_ne!(identity_hash(1, &p1), identity_hash(2, &p1));
    }

    #[test]
    #[allow(deprecated)]
    fn deprecated_flags_stay_on_patch() {
        let patch = ParamsPatch::new().fork(true).weak(true);
        assert!(patch.is_fork());
        assert!(patch.is_weak());

        let mut params = ModalParams::default();
        params.apply(&patch);
        assert_eq!(params, ModalParams::default());
    }
}
