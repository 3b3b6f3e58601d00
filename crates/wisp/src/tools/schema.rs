use serde_json::{json, Map, Value};
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    fn accepts(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
        }
    }
}

/// One named parameter of a tool
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub description: Option<String>,
    /// Closed set of accepted values, empty when any value of the type is fine
    pub allowed: Vec<Value>,
    pub minimum: Option<f64>,
}

impl FieldSpec {
    pub fn new<S: Into<String>>(name: S, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            description: None,
            allowed: Vec::new(),
            minimum: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn one_of<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.allowed = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn minimum(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    fn check(&self, value: &Value) -> Option<String> {
        if !self.field_type.accepts(value) {
            return Some(format!("expected {}", self.field_type));
        }
        if !self.allowed.is_empty() && !self.allowed.contains(value) {
            let options: Vec<String> = self
                .allowed
                .iter()
                .map(|v| v.as_str().map(String::from).unwrap_or_else(|| v.to_string()))
                .collect();
            return Some(format!("must be one of {}", options.join(", ")));
        }
        if let (Some(minimum), Some(number)) = (self.minimum, value.as_f64()) {
            if number < minimum {
                return Some(format!("must be at least {}", minimum));
            }
        }
        None
    }

    fn to_json_schema(&self) -> Value {
        let mut property = json!({ "type": self.field_type.to_string() });
        if let Some(description) = &self.description {
            property["description"] = json!(description);
        }
        if !self.allowed.is_empty() {
            property["enum"] = json!(self.allowed);
        }
        if let Some(minimum) = self.minimum {
            property["minimum"] = json!(minimum);
        }
        property
    }
}

/// Explicit description of the parameters a tool accepts.
///
/// Parameters that are not declared are ignored, and a `null` value for an
/// optional field counts as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSchema {
    fields: Vec<FieldSpec>,
}

impl ParamSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Every violation as a `field: message` string; empty means valid
    pub fn validate(&self, params: &Map<String, Value>) -> Vec<String> {
        let mut errors = Vec::new();
        for field in &self.fields {
            match params.get(&field.name) {
                None | Some(Value::Null) if field.required => {
                    errors.push(format!("{}: field required", field.name));
                }
                None | Some(Value::Null) => {}
                Some(value) => {
                    if let Some(message) = field.check(value) {
                        errors.push(format!("{}: {}", field.name, message));
                    }
                }
            }
        }
        errors
    }

    /// Render as a json schema object with `properties` and `required`
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|field| (field.name.clone(), field.to_json_schema()))
            .collect();
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|field| field.required)
            .map(|field| field.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}
