//! Sample OpenAPI document for new API projects.
//!
//! The document is written once: an existing file is never overwritten, so
//! user edits survive re-runs.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::SampleSpecError;

const ERROR_SCHEMA: &str = "ApiErrorResponseContent";
const SAY_HELLO_SCHEMA: &str = "SayHelloResponseContent";

/// Language of the generated handler, recorded on the sample operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerLanguage {
    Typescript,
    Python,
    Java,
}

impl fmt::Display for HandlerLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandlerLanguage::Typescript => "typescript",
            HandlerLanguage::Python => "python",
            HandlerLanguage::Java => "java",
        };
        f.write_str(name)
    }
}

impl FromStr for HandlerLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "typescript" | "ts" => Ok(HandlerLanguage::Typescript),
            "python" | "py" => Ok(HandlerLanguage::Python),
            "java" => Ok(HandlerLanguage::Java),
            other => Err(format!("Unsupported handler language: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSpecOptions {
    #[serde(default)]
    pub handler_language: Option<HandlerLanguage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleWrite {
    Written,
    /// The file already existed and was left untouched.
    Skipped,
}

#[derive(Serialize)]
struct Document {
    openapi: &'static str,
    info: Info,
    paths: BTreeMap<&'static str, PathItem>,
    components: Components,
}

#[derive(Serialize)]
struct Info {
    version: &'static str,
    title: &'static str,
}

#[derive(Serialize)]
struct PathItem {
    get: Operation,
}

#[derive(Serialize)]
struct HandlerAnnotation {
    language: HandlerLanguage,
}

#[derive(Serialize)]
struct Operation {
    #[serde(rename = "operationId")]
    operation_id: &'static str,
    #[serde(rename = "x-handler", skip_serializing_if = "Option::is_none")]
    handler: Option<HandlerAnnotation>,
    parameters: Vec<Parameter>,
    responses: BTreeMap<&'static str, Response>,
}

#[derive(Serialize)]
struct Parameter {
    #[serde(rename = "in")]
    location: &'static str,
    name: &'static str,
    schema: PrimitiveSchema,
    required: bool,
}

#[derive(Serialize)]
struct PrimitiveSchema {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct Response {
    description: &'static str,
    content: BTreeMap<&'static str, MediaType>,
}

#[derive(Serialize)]
struct MediaType {
    schema: SchemaRef,
}

#[derive(Serialize)]
struct SchemaRef {
    #[serde(rename = "$ref")]
    reference: String,
}

#[derive(Serialize)]
struct Components {
    schemas: BTreeMap<&'static str, ObjectSchema>,
}

#[derive(Serialize)]
struct ObjectSchema {
    #[serde(rename = "type")]
    kind: &'static str,
    properties: BTreeMap<&'static str, PrimitiveSchema>,
    required: Vec<&'static str>,
}

fn json_response(description: &'static str, schema: &str) -> Response {
    Response {
        description,
        content: BTreeMap::from([(
            "application/json",
            MediaType {
                schema: SchemaRef {
                    reference: format!("#/components/schemas/{schema}"),
                },
            },
        )]),
    }
}

fn message_schema() -> ObjectSchema {
    ObjectSchema {
        kind: "object",
        properties: BTreeMap::from([("message", PrimitiveSchema { kind: "string" })]),
        required: vec!["message"],
    }
}

fn sample_document(options: &SampleSpecOptions) -> Document {
    let operation = Operation {
        operation_id: "sayHello",
        handler: options
            .handler_language
            .map(|language| HandlerAnnotation { language }),
        parameters: vec![Parameter {
            location: "query",
            name: "name",
            schema: PrimitiveSchema { kind: "string" },
            required: true,
        }],
        responses: BTreeMap::from([
            ("200", json_response("Successful response", SAY_HELLO_SCHEMA)),
            ("400", json_response("Error response", ERROR_SCHEMA)),
            ("403", json_response("Not authorized", ERROR_SCHEMA)),
            ("500", json_response("An internal failure at the fault of the server", ERROR_SCHEMA)),
        ]),
    };

    Document {
        openapi: "3.0.3",
        info: Info {
            version: "1.0.0",
            title: "Example API",
        },
        paths: BTreeMap::from([("/hello", PathItem { get: operation })]),
        components: Components {
            schemas: BTreeMap::from([
                (ERROR_SCHEMA, message_schema()),
                (SAY_HELLO_SCHEMA, message_schema()),
            ]),
        },
    }
}

/// Renders the sample document. Same options, same bytes.
pub fn render_sample_spec(options: &SampleSpecOptions) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(&sample_document(options))
}

/// Writes the sample document to `path` unless something is already there.
pub fn write_sample_spec(path: &Path, options: &SampleSpecOptions) -> Result<SampleWrite, SampleSpecError> {
    if path.exists() {
        info!(path = %path.display(), "Sample spec already present, leaving it untouched");
        return Ok(SampleWrite::Skipped);
    }

    let contents = render_sample_spec(options)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
        debug!(dir = %parent.display(), "Ensured sample spec directory");
    }
    fs::write(path, contents)?;
    info!(
        path = %path.display(),
        language = ?options.handler_language,
        "Wrote sample spec"
    );
    Ok(SampleWrite::Written)
}
