//! Attribute extraction from tag bodies.
//!
//! Values may contain the same characters used to separate attributes, so the
//! body is never split on commas. Instead every `name =` belonging to the tag's
//! vocabulary marks a window start, and a value runs until the nearest
//! following start (or the end of the body). Names outside the vocabulary are
//! invisible: their text is absorbed into the preceding window. Only starts at
//! bracket depth zero count, and only the first occurrence of each name.

use std::collections::HashMap;

use crate::lexer::{matching_close, split_quoted_list, split_top_level, tokenize, Token, TokenKind};
use crate::tokenizer::tag_calls;

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Bool(bool),
    List(Vec<String>),
    /// Unquoted expression such as `Pet.class` or `404`
    Raw(String),
}

impl AttrValue {
    fn from_tokens(body: &str, tokens: &[Token]) -> Option<Self> {
        let mut tokens = tokens;
        while let Some((last, rest)) = tokens.split_last() {
            if last.kind != TokenKind::Comma {
                break;
            }
            tokens = rest;
        }
        let (first, last) = (tokens.first()?, tokens.last()?);

        if let [single] = tokens {
            match &single.kind {
                TokenKind::Str(s) => return Some(Self::Text(s.clone())),
                TokenKind::Word(w) if w == "true" => return Some(Self::Bool(true)),
                TokenKind::Word(w) if w == "false" => return Some(Self::Bool(false)),
                _ => {}
            }
        }

        if first.kind == TokenKind::LBrace && matching_close(tokens, 0) == Some(tokens.len() - 1) {
            let inner = &tokens[1..tokens.len() - 1];
            let items = split_top_level(inner)
                .into_iter()
                .map(|item| match item {
                    [Token { kind: TokenKind::Str(s), .. }] => s.clone(),
                    _ => slice(body, item).trim_matches('"').to_string(),
                })
                .collect();
            return Some(Self::List(items));
        }

        if let Some(joined) = concatenation(tokens) {
            return Some(Self::Text(joined));
        }

        Some(Self::Raw(body[first.span.start..last.span.end].trim().to_string()))
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Text(s) | Self::Raw(s) => s,
            Self::Bool(b) => b.to_string(),
            Self::List(items) => items.join(","),
        }
    }

    /// Lists pass through, text is split on commas outside quotes.
    pub fn into_list(self) -> Vec<String> {
        match self {
            Self::List(items) => items,
            Self::Text(s) | Self::Raw(s) => split_quoted_list(&s),
            Self::Bool(b) => vec![b.to_string()],
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(s) | Self::Raw(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            Self::List(_) => None,
        }
    }
}

fn slice<'a>(body: &'a str, tokens: &[Token]) -> &'a str {
    match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) => body[first.span.start..last.span.end].trim(),
        _ => "",
    }
}

/// `"a" + "b" + ...` joined into one string.
fn concatenation(tokens: &[Token]) -> Option<String> {
    if tokens.len() < 3 || tokens.len() % 2 == 0 {
        return None;
    }
    let mut joined = String::new();
    for (idx, token) in tokens.iter().enumerate() {
        match (&token.kind, idx % 2) {
            (TokenKind::Str(s), 0) => joined.push_str(s),
            (TokenKind::Punct('+'), 1) => {}
            _ => return None,
        }
    }
    Some(joined)
}

/// Attribute values found in one tag body, keyed by vocabulary name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeValues {
    values: HashMap<&'static str, AttrValue>,
}

impl AttributeValues {
    pub fn extract(body: &str, vocabulary: &[&'static str]) -> Self {
        let tokens = tokenize(body);
        let starts = window_starts(&tokens, vocabulary);
        let mut values = HashMap::new();

        for (pos, &(start, name)) in starts.iter().enumerate() {
            let end = starts.get(pos + 1).map(|&(next, _)| next).unwrap_or(tokens.len());
            if let Some(value) = AttrValue::from_tokens(body, &tokens[start + 2..end]) {
                values.insert(name, value);
            }
        }

        // Single-element shorthand: `@Path("/x")`, `@ApiResponses({...})`
        let is_assignment = matches!(
            tokens.as_slice(),
            [Token { kind: TokenKind::Word(_), .. }, Token { kind: TokenKind::Eq, .. }, ..]
        );
        if starts.is_empty() && !is_assignment && vocabulary.contains(&"value") {
            if let Some(value) = AttrValue::from_tokens(body, &tokens) {
                values.insert("value", value);
            }
        }

        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.values.get(name)
    }

    pub fn take_text(&mut self, name: &str) -> Option<String> {
        self.values.remove(name).map(AttrValue::into_text)
    }

    pub fn take_list(&mut self, name: &str) -> Option<Vec<String>> {
        self.values.remove(name).map(AttrValue::into_list)
    }

    pub fn take_flag(&mut self, name: &str) -> Option<bool> {
        self.values.remove(name).and_then(|v| v.as_flag())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Token index of each vocabulary `name =` at depth zero, in source order.
fn window_starts(tokens: &[Token], vocabulary: &[&'static str]) -> Vec<(usize, &'static str)> {
    let mut starts: Vec<(usize, &'static str)> = Vec::new();
    let mut depth = 0usize;

    for (idx, token) in tokens.iter().enumerate() {
        if token.is_open() {
            depth += 1;
            continue;
        }
        if token.is_close() {
            depth = depth.saturating_sub(1);
            continue;
        }
        if depth > 0 {
            continue;
        }
        let Some(word) = token.word() else { continue };
        let assigned = matches!(tokens.get(idx + 1), Some(next) if next.kind == TokenKind::Eq);
        if !assigned {
            continue;
        }
        if let Some(name) = vocabulary.iter().copied().find(|v| *v == word) {
            if starts.iter().all(|&(_, seen)| seen != name) {
                starts.push((idx, name));
            }
        }
    }

    starts
}

/// A tag whose body is read through a fixed vocabulary.
pub trait TagAttributes: Sized {
    const TAG: &'static str;
    const VOCABULARY: &'static [&'static str];

    fn from_values(values: AttributeValues) -> Self;

    fn parse(body: &str) -> Self {
        Self::from_values(AttributeValues::extract(body, Self::VOCABULARY))
    }
}

/// Bodies of each `@Element(...)` inside an aggregate such as
/// `value = { @ApiResponse(...), @ApiResponse(...) }`.
///
/// The aggregate is the first brace group that opens before any nested tag;
/// without one the whole body is searched.
pub fn nested_bodies<'a>(body: &'a str, element: &str) -> Vec<&'a str> {
    let tokens = tokenize(body);
    let first_at = tokens.iter().position(|t| t.kind == TokenKind::At);
    let brace = tokens.iter().position(|t| t.kind == TokenKind::LBrace);

    let inner = match brace {
        Some(open) if first_at.map_or(true, |at| open < at) => {
            let from = tokens[open].span.end;
            match matching_close(&tokens, open) {
                Some(close) => &body[from..tokens[close].span.start],
                None => &body[from..],
            }
        }
        _ => body,
    };

    tag_calls(inner)
        .into_iter()
        .filter(|call| call.name == element)
        .filter_map(|call| call.args)
        .collect()
}

pub fn parse_aggregate<T: TagAttributes>(body: &str) -> Vec<T> {
    nested_bodies(body, T::TAG).into_iter().map(T::parse).collect()
}

/// Class-level `@Api(...)`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiAttrs {
    pub value: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub produces: Option<Vec<String>>,
    pub consumes: Option<Vec<String>>,
    pub hidden: bool,
}

impl TagAttributes for ApiAttrs {
    const TAG: &'static str = "Api";
    const VOCABULARY: &'static [&'static str] = &[
        "value",
        "tags",
        "description",
        "basePath",
        "position",
        "produces",
        "consumes",
        "protocols",
        "authorizations",
        "hidden",
    ];

    fn from_values(mut values: AttributeValues) -> Self {
        Self {
            value: values.take_text("value"),
            description: values.take_text("description"),
            tags: values.take_list("tags"),
            produces: values.take_list("produces"),
            consumes: values.take_list("consumes"),
            hidden: values.take_flag("hidden").unwrap_or(false),
        }
    }
}

/// Method-level `@ApiOperation(...)`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationAttrs {
    pub value: Option<String>,
    pub notes: Option<String>,
    pub http_method: Option<String>,
    pub nickname: Option<String>,
    pub response: Option<String>,
    pub response_container: Option<String>,
    pub produces: Option<Vec<String>>,
    pub consumes: Option<Vec<String>>,
    pub protocols: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub hidden: bool,
}

impl TagAttributes for OperationAttrs {
    const TAG: &'static str = "ApiOperation";
    const VOCABULARY: &'static [&'static str] = &[
        "value",
        "authorizations",
        "code",
        "consumes",
        "extensions",
        "hidden",
        "httpMethod",
        "nickname",
        "notes",
        "produces",
        "protocols",
        "response",
        "responseContainer",
        "responseHeaders",
        "responseReference",
        "tags",
    ];

    fn from_values(mut values: AttributeValues) -> Self {
        Self {
            value: values.take_text("value"),
            notes: values.take_text("notes"),
            http_method: values.take_text("httpMethod"),
            nickname: values.take_text("nickname"),
            response: values.take_text("response"),
            response_container: values.take_text("responseContainer"),
            produces: values.take_list("produces"),
            consumes: values.take_list("consumes"),
            protocols: values.take_list("protocols"),
            tags: values.take_list("tags"),
            hidden: values.take_flag("hidden").unwrap_or(false),
        }
    }
}

/// One `@ApiImplicitParam(...)` inside `@ApiImplicitParams`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImplicitParamAttrs {
    pub name: Option<String>,
    pub value: Option<String>,
    pub param_type: Option<String>,
    pub data_type: Option<String>,
    pub required: Option<bool>,
    pub default_value: Option<String>,
    pub allowable_values: Option<String>,
    pub allow_multiple: bool,
}

impl TagAttributes for ImplicitParamAttrs {
    const TAG: &'static str = "ApiImplicitParam";
    const VOCABULARY: &'static [&'static str] = &[
        "access",
        "allowableValues",
        "allowMultiple",
        "dataType",
        "defaultValue",
        "example",
        "examples",
        "name",
        "paramType",
        "required",
        "value",
    ];

    fn from_values(mut values: AttributeValues) -> Self {
        Self {
            name: values.take_text("name"),
            value: values.take_text("value"),
            param_type: values.take_text("paramType"),
            data_type: values.take_text("dataType"),
            required: values.take_flag("required"),
            default_value: values.take_text("defaultValue"),
            allowable_values: values.take_text("allowableValues"),
            allow_multiple: values.take_flag("allowMultiple").unwrap_or(false),
        }
    }
}

/// One `@ApiResponse(...)` inside `@ApiResponses`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseAttrs {
    pub code: Option<String>,
    pub message: Option<String>,
}

impl TagAttributes for ResponseAttrs {
    const TAG: &'static str = "ApiResponse";
    const VOCABULARY: &'static [&'static str] = &[
        "code",
        "message",
        "response",
        "reference",
        "responseHeaders",
        "responseContainer",
        "examples",
    ];

    fn from_values(mut values: AttributeValues) -> Self {
        Self {
            code: values.take_text("code"),
            message: values.take_text("message"),
        }
    }
}

/// `@Path("...")` on a class or method
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathAttrs {
    pub value: Option<String>,
}

impl TagAttributes for PathAttrs {
    const TAG: &'static str = "Path";
    const VOCABULARY: &'static [&'static str] = &["value"];

    fn from_values(mut values: AttributeValues) -> Self {
        Self { value: values.take_text("value") }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extraction_is_order_independent() {
        let forward = OperationAttrs::parse(
            r#"value = "Find pet", httpMethod = "GET", nickname = "getPetById", response = Pet"#,
        );
        let shuffled = OperationAttrs::parse(
            r#"response = Pet, nickname = "getPetById", value = "Find pet", httpMethod = "GET""#,
        );
        assert_eq!(forward, shuffled);
        assert_eq!(forward.value.as_deref(), Some("Find pet"));
        assert_eq!(forward.http_method.as_deref(), Some("GET"));
        assert_eq!(forward.nickname.as_deref(), Some("getPetById"));
        assert_eq!(forward.response.as_deref(), Some("Pet"));
    }

    #[test]
    fn test_values_keep_delimiters() {
        let attrs = OperationAttrs::parse(
            r#"notes = "Use tag1, tag2 = {x}, tag3", value = "Finds, by (tags)", produces = "application/xml, application/json""#,
        );
        assert_eq!(attrs.notes.as_deref(), Some("Use tag1, tag2 = {x}, tag3"));
        assert_eq!(attrs.value.as_deref(), Some("Finds, by (tags)"));
        assert_eq!(
            attrs.produces,
            Some(vec!["application/xml".to_string(), "application/json".to_string()])
        );
    }

    #[test]
    fn test_tags_list_rule() {
        let attrs = ApiAttrs::parse(r#"value = "/pet", tags = {"pet", "store, admin"}, description = "Pets""#);
        assert_eq!(
            attrs.tags,
            Some(vec!["pet".to_string(), "store, admin".to_string()])
        );
        assert_eq!(attrs.description.as_deref(), Some("Pets"));
    }

    #[test]
    fn test_unknown_names_are_absorbed() {
        let mut values = AttributeValues::extract(
            r#"code = 404, bogus = "x", message = "Not found""#,
            ResponseAttrs::VOCABULARY,
        );
        assert_eq!(values.len(), 2);
        assert_eq!(values.get("code"), Some(&AttrValue::Raw(r#"404, bogus = "x""#.to_string())));
        assert_eq!(values.take_text("message").as_deref(), Some("Not found"));
    }

    #[test]
    fn test_nested_names_do_not_start_windows() {
        let attrs = OperationAttrs::parse(
            r#"authorizations = @Authorization(value = "api_key"), value = "Find pet""#,
        );
        assert_eq!(attrs.value.as_deref(), Some("Find pet"));
    }

    #[test]
    fn test_first_occurrence_wins() {
        let values = AttributeValues::extract(r#"value = "a", value = "b""#, &["value"]);
        assert_eq!(
            values.get("value"),
            Some(&AttrValue::Raw(r#""a", value = "b""#.to_string()))
        );
    }

    #[test]
    fn test_value_shapes() {
        let mut values = AttributeValues::extract(
            r#"hidden = true, response = Pet.class, notes = "a" + "b", tags = {}"#,
            OperationAttrs::VOCABULARY,
        );
        assert_eq!(values.get("hidden"), Some(&AttrValue::Bool(true)));
        assert_eq!(values.get("response"), Some(&AttrValue::Raw("Pet.class".to_string())));
        assert_eq!(values.get("notes"), Some(&AttrValue::Text("ab".to_string())));
        assert_eq!(values.take_list("tags"), Some(Vec::new()));
    }

    #[test]
    fn test_single_element_shorthand() {
        assert_eq!(PathAttrs::parse(r#""/{petId}""#).value.as_deref(), Some("/{petId}"));
        assert_eq!(PathAttrs::parse(r#"value = "/x""#).value.as_deref(), Some("/x"));
        assert_eq!(
            OperationAttrs::parse(r#""Summary only""#).value.as_deref(),
            Some("Summary only")
        );
        assert_eq!(PathAttrs::parse(r#"other = "/x""#).value, None);
    }

    #[test]
    fn test_implicit_params_aggregate() {
        let body = r#"value = {
   @ApiImplicitParam(name = "apiKey", dataType = "String", paramType = "header"),
   @ApiImplicitParam(
      name = "status", value = "Status values, comma separated",
      required = true, defaultValue = "available", dataType = "String",
      allowableValues = "available,pending,sold", allowMultiple = true, paramType = "query"
   )
 }"#;
        let params: Vec<ImplicitParamAttrs> = parse_aggregate(body);
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name.as_deref(), Some("apiKey"));
        assert_eq!(params[0].param_type.as_deref(), Some("header"));
        assert_eq!(params[0].required, None);

        let status = &params[1];
        assert_eq!(status.value.as_deref(), Some("Status values, comma separated"));
        assert_eq!(status.required, Some(true));
        assert_eq!(status.default_value.as_deref(), Some("available"));
        assert_eq!(status.allowable_values.as_deref(), Some("available,pending,sold"));
        assert!(status.allow_multiple);
    }

    #[test]
    fn test_responses_aggregate_forms() {
        let bare: Vec<ResponseAttrs> = parse_aggregate(
            r#"{ @ApiResponse(code = 400, message = "Invalid ID"), @ApiResponse(message = "Pet {id} not found", code = 404) }"#,
        );
        assert_eq!(bare.len(), 2);
        assert_eq!(bare[0].code.as_deref(), Some("400"));
        assert_eq!(bare[1].code.as_deref(), Some("404"));
        assert_eq!(bare[1].message.as_deref(), Some("Pet {id} not found"));

        let single: Vec<ResponseAttrs> =
            parse_aggregate(r#"@ApiResponse(code = 405, message = "Invalid input")"#);
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].code.as_deref(), Some("405"));
    }

    #[test]
    fn test_string_required_flag() {
        let attrs = ImplicitParamAttrs::parse(r#"name="id", required="true", dataType="integer""#);
        assert_eq!(attrs.required, Some(true));
        assert_eq!(attrs.data_type.as_deref(), Some("integer"));
    }
}
