//! Conversion of extracted tag attributes into Swagger parameter, response
//! and operation objects.

use indexmap::IndexMap;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::attributes::{ImplicitParamAttrs, OperationAttrs, ResponseAttrs};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::lexer::split_quoted_list;
use crate::models::{Operation, ParamLocation, Parameter, Response, Schema};

static COLLECTION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?:List|Set|Collection)\s*<\s*([\w.$]+)\s*>|([\w.$]+)\s*\[.*?\])$").unwrap()
});

static RANGE_START_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^range\s*[\[(]").unwrap());

static RANGE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^range\s*([\[(])(.*)([\])])$").unwrap()
});

static STATUS_CODE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{3}$").unwrap());

const SUCCESS_DESCRIPTION: &str = "successful operation";

/// Swagger primitive `(type, format)` for a raw type name, if it is one.
pub fn primitive(raw: &str) -> Option<(&'static str, Option<&'static str>)> {
    let primitive = match raw.trim().to_ascii_lowercase().as_str() {
        "integer" => ("integer", Some("int32")),
        "long" => ("integer", Some("int64")),
        "float" => ("number", Some("float")),
        "double" => ("number", Some("double")),
        "string" => ("string", None),
        "byte" => ("string", Some("byte")),
        "binary" => ("string", Some("binary")),
        "boolean" => ("boolean", None),
        "date" => ("string", Some("date")),
        "datetime" => ("string", Some("date-time")),
        "password" => ("string", Some("password")),
        _ => return None,
    };
    Some(primitive)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedType {
    Primitive {
        type_: &'static str,
        format: Option<&'static str>,
    },
    Reference(String),
    Array(Box<ResolvedType>),
}

impl ResolvedType {
    pub fn primitive_type(&self) -> Option<&'static str> {
        match self {
            Self::Primitive { type_, .. } => Some(*type_),
            _ => None,
        }
    }

    pub fn to_schema(&self) -> Schema {
        match self {
            Self::Primitive { type_, format } => Schema {
                type_: Some(type_.to_string()),
                format: format.map(str::to_string),
                ..Default::default()
            },
            Self::Reference(name) => Schema::reference(name),
            Self::Array(items) => Schema::array_of(items.to_schema()),
        }
    }
}

/// Resolves a `dataType`/`response` value: primitives through the type table,
/// `Name[]` and `List<Name>` as arrays, anything else as a definition reference.
pub fn resolve_type(raw: &str) -> ResolvedType {
    let name = raw.trim().trim_matches('"').trim();
    let name = name.strip_suffix(".class").unwrap_or(name);

    if let Some((type_, format)) = primitive(name) {
        return ResolvedType::Primitive { type_, format };
    }
    if let Some(captures) = COLLECTION_REGEX.captures(name) {
        if let Some(inner) = captures.get(1).or_else(|| captures.get(2)) {
            return ResolvedType::Array(Box::new(resolve_type(inner.as_str())));
        }
    }
    ResolvedType::Reference(name.to_string())
}

fn is_void(raw: &str) -> bool {
    let name = raw.trim().trim_matches('"').trim();
    let name = name.strip_suffix(".class").unwrap_or(name);
    matches!(name, "void" | "Void" | "java.lang.Void")
}

/// Casts a string default to the native representation of a primitive type.
pub fn cast_default(raw: &str, type_: &str) -> Result<Value, String> {
    let trimmed = raw.trim();
    match type_ {
        "integer" => trimmed
            .parse::<i64>()
            .map(Value::from)
            .map_err(|e| format!("'{}' is not an integer: {}", raw, e)),
        "number" => trimmed
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("'{}' is not a number", raw)),
        "boolean" => trimmed
            .parse::<bool>()
            .map(Value::Bool)
            .map_err(|_| format!("'{}' is not a boolean", raw)),
        _ => Ok(Value::String(raw.to_string())),
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ConstraintError {
    #[error("allowableValues is empty")]
    Empty,

    #[error("malformed range expression: {0}")]
    MalformedRange(String),

    #[error("range bound out of bounds: {0}")]
    BoundOverflow(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Range {
        minimum: Option<Value>,
        maximum: Option<Value>,
        /// An exclusive bound was not an integer, so the one-unit shift is
        /// not an exact inclusive equivalent
        inexact: bool,
    },
    Enum(Vec<String>),
}

/// Parses `allowableValues`: `range[a,b]` style ranges or a comma list enum.
///
/// `[`/`]` mark inclusive bounds and `(`/`)` exclusive ones. An exclusive
/// bound, on either side, is rewritten as the bound minus one.
pub fn parse_allowable_values(raw: &str) -> Result<Constraint, ConstraintError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConstraintError::Empty);
    }

    let unquoted = trimmed.trim_matches('"').trim();
    if !RANGE_START_REGEX.is_match(unquoted) {
        let values = split_quoted_list(trimmed);
        if values.is_empty() {
            return Err(ConstraintError::Empty);
        }
        return Ok(Constraint::Enum(values));
    }

    let captures = RANGE_REGEX
        .captures(unquoted)
        .ok_or_else(|| ConstraintError::MalformedRange(raw.to_string()))?;
    let bounds: Vec<&str> = captures[2].split(',').collect();
    let [start, end] = bounds.as_slice() else {
        return Err(ConstraintError::MalformedRange(raw.to_string()));
    };

    let (minimum, start_inexact) = parse_bound(start, &captures[1] == "(", raw)?;
    let (maximum, end_inexact) = parse_bound(end, &captures[3] == ")", raw)?;

    Ok(Constraint::Range {
        minimum,
        maximum,
        inexact: start_inexact || end_inexact,
    })
}

fn parse_bound(bound: &str, exclusive: bool, raw: &str) -> Result<(Option<Value>, bool), ConstraintError> {
    let bound = bound.trim();
    if bound.is_empty() {
        return Err(ConstraintError::MalformedRange(raw.to_string()));
    }
    if matches!(bound.to_ascii_lowercase().as_str(), "infinity" | "+infinity" | "-infinity") {
        return Ok((None, false));
    }

    if let Ok(n) = bound.parse::<i64>() {
        let n = if exclusive {
            n.checked_sub(1)
                .ok_or_else(|| ConstraintError::BoundOverflow(bound.to_string()))?
        } else {
            n
        };
        return Ok((Some(Value::from(n)), false));
    }

    if let Ok(f) = bound.parse::<f64>() {
        let f = if exclusive { f - 1.0 } else { f };
        let number = serde_json::Number::from_f64(f)
            .ok_or_else(|| ConstraintError::MalformedRange(raw.to_string()))?;
        return Ok((Some(Value::Number(number)), exclusive));
    }

    // Lexical bounds cannot be shifted
    Ok((Some(Value::String(bound.to_string())), exclusive))
}

fn apply_constraint(schema: &mut Schema, constraint: Constraint) {
    match constraint {
        Constraint::Range { minimum, maximum, .. } => {
            schema.minimum = minimum;
            schema.maximum = maximum;
        }
        Constraint::Enum(values) => {
            schema.enum_values = Some(values.into_iter().map(Value::String).collect());
        }
    }
}

/// Converts one `@ApiImplicitParam`. Returns `None` when the parameter
/// cannot be placed (no name, unknown location).
pub fn convert_parameter(
    attrs: ImplicitParamAttrs,
    location: &str,
    diagnostics: &mut Diagnostics,
) -> Option<Parameter> {
    let Some(name) = attrs.name.filter(|n| !n.trim().is_empty()) else {
        diagnostics.warn(
            DiagnosticKind::InvalidParameter,
            location,
            "@ApiImplicitParam without a name was skipped",
        );
        return None;
    };
    let param_location = match attrs.param_type.as_deref() {
        None => {
            debug!("{}: parameter '{}' has no paramType, using query", location, name);
            ParamLocation::Query
        }
        Some(raw) => match ParamLocation::parse(raw) {
            Some(param_location) => param_location,
            None => {
                diagnostics.warn(
                    DiagnosticKind::InvalidParameter,
                    location,
                    format!("parameter '{}' has unknown paramType '{}' and was skipped", name, raw),
                );
                return None;
            }
        },
    };

    let resolved = resolve_type(attrs.data_type.as_deref().unwrap_or("string"));
    let mut parameter = Parameter {
        name,
        location: param_location,
        description: attrs.value,
        required: attrs.required.unwrap_or(false),
        inline: Schema::default(),
        collectionFormat: None,
        schema: None,
    };
    let is_body = param_location == ParamLocation::Body;

    let Some(type_) = resolved.primitive_type() else {
        if attrs.default_value.is_some() || attrs.allowable_values.is_some() {
            debug!(
                "{}: default/allowableValues ignored on non-primitive parameter '{}'",
                location, parameter.name
            );
        }
        parameter.schema = Some(resolved.to_schema());
        return Some(parameter);
    };

    let mut value_schema = resolved.to_schema();

    if let Some(raw) = attrs.default_value.as_deref() {
        match cast_default(raw, type_) {
            Ok(value) => value_schema.default = Some(value),
            Err(reason) => diagnostics.warn(
                DiagnosticKind::MalformedDefault,
                location,
                format!("default of parameter '{}' omitted: {}", parameter.name, reason),
            ),
        }
    }

    if let Some(raw) = attrs.allowable_values.as_deref() {
        match parse_allowable_values(raw) {
            Ok(constraint) => {
                if let Constraint::Range { inexact: true, .. } = constraint {
                    diagnostics.warn(
                        DiagnosticKind::InexactRangeBound,
                        location,
                        format!(
                            "parameter '{}': exclusive non-integer bound in '{}' shifted by one unit",
                            parameter.name, raw
                        ),
                    );
                }
                apply_constraint(&mut value_schema, constraint);
            }
            Err(err) => diagnostics.warn(
                DiagnosticKind::MalformedConstraint,
                location,
                format!("constraint of parameter '{}' omitted: {}", parameter.name, err),
            ),
        }
    }

    if is_body {
        parameter.schema = Some(value_schema);
    } else if attrs.allow_multiple {
        parameter.inline = Schema::array_of(value_schema);
        parameter.collectionFormat = Some("csv".to_string());
    } else {
        parameter.inline = value_schema;
    }

    Some(parameter)
}

/// Builds the response map: declared codes first, then the synthesized `200`
/// when the operation names a response type.
pub fn convert_responses(
    declared: Vec<ResponseAttrs>,
    operation: &OperationAttrs,
    location: &str,
    diagnostics: &mut Diagnostics,
) -> IndexMap<String, Response> {
    let mut responses = IndexMap::new();

    for response in declared {
        let code = response.code.unwrap_or_default().trim().to_string();
        if !STATUS_CODE_REGEX.is_match(&code) {
            diagnostics.warn(
                DiagnosticKind::InvalidStatusCode,
                location,
                format!("@ApiResponse with status code '{}' was skipped", code),
            );
            continue;
        }
        responses.insert(
            code,
            Response {
                description: response.message.unwrap_or_default(),
                schema: None,
            },
        );
    }

    if let Some(raw) = operation.response.as_deref().filter(|r| !is_void(r)) {
        let resolved = resolve_type(raw).to_schema();
        let schema = match operation.response_container {
            Some(_) => Schema::array_of(resolved),
            None => resolved,
        };
        responses.insert(
            "200".to_string(),
            Response {
                description: SUCCESS_DESCRIPTION.to_string(),
                schema: Some(schema),
            },
        );
    }

    responses
}

fn non_empty(list: Option<Vec<String>>) -> Option<Vec<String>> {
    list.filter(|items| !items.is_empty())
}

/// Assembles an operation from its method-level tags. Tags are left empty when
/// the operation declares none, for the path assembler to fill in.
pub fn build_operation(
    method_name: &str,
    attrs: OperationAttrs,
    responses: Vec<ResponseAttrs>,
    params: Vec<ImplicitParamAttrs>,
    location: &str,
    diagnostics: &mut Diagnostics,
) -> Operation {
    let responses = convert_responses(responses, &attrs, location, diagnostics);
    let parameters = params
        .into_iter()
        .filter_map(|param| convert_parameter(param, location, diagnostics))
        .collect();

    let operation_id = attrs
        .nickname
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| method_name.to_string());

    Operation {
        tags: attrs.tags.unwrap_or_default(),
        summary: attrs.value,
        description: attrs.notes,
        operationId: operation_id,
        schemes: non_empty(attrs.protocols),
        consumes: non_empty(attrs.consumes),
        produces: non_empty(attrs.produces),
        parameters,
        responses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::TagAttributes;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_primitive_table() {
        let table = [
            ("integer", "integer", Some("int32")),
            ("long", "integer", Some("int64")),
            ("float", "number", Some("float")),
            ("double", "number", Some("double")),
            ("string", "string", None),
            ("byte", "string", Some("byte")),
            ("binary", "string", Some("binary")),
            ("boolean", "boolean", None),
            ("date", "string", Some("date")),
            ("datetime", "string", Some("date-time")),
            ("password", "string", Some("password")),
        ];
        for (raw, type_, format) in table {
            assert_eq!(resolve_type(raw), ResolvedType::Primitive { type_, format }, "{}", raw);
            assert_eq!(
                resolve_type(&raw.to_uppercase()),
                ResolvedType::Primitive { type_, format }
            );
        }
    }

    #[test]
    fn test_reference_and_collections() {
        assert_eq!(resolve_type("Pet"), ResolvedType::Reference("Pet".into()));
        assert_eq!(resolve_type("Pet.class"), ResolvedType::Reference("Pet".into()));

        let expected = json!({"type": "array", "items": {"$ref": "#/definitions/Foo"}});
        for raw in ["Foo[]", "List<Foo>"] {
            assert_eq!(serde_json::to_value(resolve_type(raw).to_schema()).unwrap(), expected);
        }
        assert_eq!(
            resolve_type("List<long>"),
            ResolvedType::Array(Box::new(ResolvedType::Primitive {
                type_: "integer",
                format: Some("int64")
            }))
        );
    }

    #[test]
    fn test_range_inclusive_and_exclusive() {
        assert_eq!(
            parse_allowable_values("range[0,10]").unwrap(),
            Constraint::Range { minimum: Some(json!(0)), maximum: Some(json!(10)), inexact: false }
        );
        assert_eq!(
            parse_allowable_values("range(0,10)").unwrap(),
            Constraint::Range { minimum: Some(json!(-1)), maximum: Some(json!(9)), inexact: false }
        );
        assert_eq!(
            parse_allowable_values("range[1, infinity]").unwrap(),
            Constraint::Range { minimum: Some(json!(1)), maximum: None, inexact: false }
        );
    }

    #[test]
    fn test_range_float_exclusive_is_flagged() {
        match parse_allowable_values("range(0.5,2.5]").unwrap() {
            Constraint::Range { minimum, maximum, inexact } => {
                assert_eq!(minimum, Some(json!(-0.5)));
                assert_eq!(maximum, Some(json!(2.5)));
                assert!(inexact);
            }
            other => panic!("expected range, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_ranges() {
        assert!(matches!(
            parse_allowable_values("range[1,2,3]"),
            Err(ConstraintError::MalformedRange(_))
        ));
        assert!(matches!(
            parse_allowable_values("range[1,5"),
            Err(ConstraintError::MalformedRange(_))
        ));
        assert_eq!(parse_allowable_values("  "), Err(ConstraintError::Empty));
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!(
            parse_allowable_values("a,b,c").unwrap(),
            Constraint::Enum(vec!["a".into(), "b".into(), "c".into()])
        );
        assert_eq!(
            parse_allowable_values(r#""x, y", z"#).unwrap(),
            Constraint::Enum(vec!["x, y".into(), "z".into()])
        );
        assert_eq!(
            parse_allowable_values("ranged,short").unwrap(),
            Constraint::Enum(vec!["ranged".into(), "short".into()])
        );
        assert_eq!(
            parse_allowable_values("range").unwrap(),
            Constraint::Enum(vec!["range".into()])
        );
    }

    #[test]
    fn test_cast_default() {
        assert_eq!(cast_default("42", "integer"), Ok(json!(42)));
        assert_eq!(cast_default("1.5", "number"), Ok(json!(1.5)));
        assert_eq!(cast_default("true", "boolean"), Ok(json!(true)));
        assert_eq!(cast_default("available", "string"), Ok(json!("available")));
        assert!(cast_default("abc", "integer").is_err());
    }

    #[test]
    fn test_convert_path_parameter() {
        let mut diagnostics = Diagnostics::new();
        let attrs = ImplicitParamAttrs::parse(
            r#"name = "petId", value = "ID of pet", allowableValues = "range[1,5]", required = true, dataType = "Long", paramType = "path""#,
        );
        let param = convert_parameter(attrs, "Pet.java:10", &mut diagnostics).unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(
            serde_json::to_value(&param).unwrap(),
            json!({
                "name": "petId",
                "in": "path",
                "description": "ID of pet",
                "required": true,
                "type": "integer",
                "format": "int64",
                "minimum": 1,
                "maximum": 5
            })
        );
    }

    #[test]
    fn test_convert_multi_value_query_parameter() {
        let mut diagnostics = Diagnostics::new();
        let attrs = ImplicitParamAttrs::parse(
            r#"name = "status", required = true, defaultValue = "available", dataType = "String", allowableValues = "available,pending,sold", allowMultiple = true, paramType = "query""#,
        );
        let param = convert_parameter(attrs, "Pet.java:20", &mut diagnostics).unwrap();
        assert_eq!(
            serde_json::to_value(&param).unwrap(),
            json!({
                "name": "status",
                "in": "query",
                "required": true,
                "type": "array",
                "items": {
                    "type": "string",
                    "default": "available",
                    "enum": ["available", "pending", "sold"]
                },
                "collectionFormat": "csv"
            })
        );
    }

    #[test]
    fn test_convert_body_and_reference_parameters() {
        let mut diagnostics = Diagnostics::new();
        let body = convert_parameter(
            ImplicitParamAttrs::parse(r#"name = "pet", required = true, paramType = "body", dataType = "Pet""#),
            "Pet.java",
            &mut diagnostics,
        )
        .unwrap();
        assert_eq!(body.schema, Some(Schema::reference("Pet")));
        assert!(body.inline.is_empty());

        let ids = convert_parameter(
            ImplicitParamAttrs::parse(r#"name = "ids", paramType = "query", dataType = "List<Pet>""#),
            "Pet.java",
            &mut diagnostics,
        )
        .unwrap();
        assert_eq!(ids.schema, Some(Schema::array_of(Schema::reference("Pet"))));
        assert!(!ids.required);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_local_failures_keep_parameter() {
        let mut diagnostics = Diagnostics::new();
        let param = convert_parameter(
            ImplicitParamAttrs::parse(
                r#"name = "limit", paramType = "query", dataType = "integer", defaultValue = "ten", allowableValues = "range[1,"#,
            ),
            "Pet.java",
            &mut diagnostics,
        )
        .unwrap();
        assert_eq!(param.inline.type_.as_deref(), Some("integer"));
        assert_eq!(param.inline.default, None);
        assert_eq!(param.inline.minimum, None);
        assert_eq!(diagnostics.count(DiagnosticKind::MalformedDefault), 1);
        assert_eq!(diagnostics.count(DiagnosticKind::MalformedConstraint), 1);
    }

    #[test]
    fn test_invalid_parameters_skipped() {
        let mut diagnostics = Diagnostics::new();
        assert!(convert_parameter(
            ImplicitParamAttrs::parse(r#"dataType = "string""#),
            "Pet.java",
            &mut diagnostics
        )
        .is_none());
        assert!(convert_parameter(
            ImplicitParamAttrs::parse(r#"name = "c", paramType = "cookie""#),
            "Pet.java",
            &mut diagnostics
        )
        .is_none());
        assert_eq!(diagnostics.count(DiagnosticKind::InvalidParameter), 2);
    }

    #[test]
    fn test_responses_with_container() {
        let mut diagnostics = Diagnostics::new();
        let operation = OperationAttrs::parse(r#"value = "Find", response = "Pet", responseContainer = "List""#);
        let declared = vec![
            ResponseAttrs { code: Some("400".into()), message: Some("Invalid status".into()) },
            ResponseAttrs { code: Some("abc".into()), message: Some("bogus".into()) },
        ];
        let responses = convert_responses(declared, &operation, "Pet.java", &mut diagnostics);

        assert_eq!(
            serde_json::to_value(&responses).unwrap(),
            json!({
                "400": {"description": "Invalid status"},
                "200": {
                    "description": "successful operation",
                    "schema": {"type": "array", "items": {"$ref": "#/definitions/Pet"}}
                }
            })
        );
        assert_eq!(diagnostics.count(DiagnosticKind::InvalidStatusCode), 1);
    }

    #[test]
    fn test_synthesized_200_overwrites_declared() {
        let mut diagnostics = Diagnostics::new();
        let operation = OperationAttrs::parse(r#"response = Pet.class"#);
        let declared = vec![ResponseAttrs { code: Some("200".into()), message: Some("ok".into()) }];
        let responses = convert_responses(declared, &operation, "Pet.java", &mut diagnostics);
        assert_eq!(responses.len(), 1);
        assert_eq!(responses["200"].description, "successful operation");
        assert_eq!(responses["200"].schema, Some(Schema::reference("Pet")));

        let void = OperationAttrs::parse(r#"response = Void.class"#);
        assert!(convert_responses(Vec::new(), &void, "Pet.java", &mut diagnostics).is_empty());
    }

    #[test]
    fn test_build_operation_fields() {
        let mut diagnostics = Diagnostics::new();
        let attrs = OperationAttrs::parse(
            r#"value = "Deletes a pet", nickname = "deletePetNickname", produces = "application/json""#,
        );
        let op = build_operation("deletePet", attrs, Vec::new(), Vec::new(), "Pet.java", &mut diagnostics);
        assert_eq!(op.operationId, "deletePetNickname");
        assert_eq!(op.summary.as_deref(), Some("Deletes a pet"));
        assert_eq!(op.description, None);
        assert_eq!(op.produces, Some(vec!["application/json".to_string()]));
        assert_eq!(op.consumes, None);
        assert!(op.tags.is_empty());

        let attrs = OperationAttrs::parse(r#"value = "Add", nickname = """#);
        let op = build_operation("addPet", attrs, Vec::new(), Vec::new(), "Pet.java", &mut diagnostics);
        assert_eq!(op.operationId, "addPet");
    }
}
