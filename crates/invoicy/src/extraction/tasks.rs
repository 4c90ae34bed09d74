//! The fixed set of extraction tasks run against every invoice.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::api::ToolDefinition;
use super::error::ExtractionError;

const PARTIES_SCHEMA: &str = include_str!("../../../../schema/tasks/parties.json");
const LINE_ITEMS_SCHEMA: &str = include_str!("../../../../schema/tasks/line_items.json");
const TAXES_SCHEMA: &str = include_str!("../../../../schema/tasks/taxes.json");

const PARTIES_PROMPT: &str = "Extrae los detalles estructurados de la factura. Incluye el domicilio comercial del emisor y del receptor, priorizando siempre el Domicilio Comercial sobre el Legal o Fiscal. SE MUY CRÍTICO PARA NÚMERO DE FACTURA - Identifica el número único de esta factura/comprobante";

const LINE_ITEMS_PROMPT: &str = "Extrae los detalles estructurados de la factura";

const TAXES_PROMPT: &str = "Extrae y clasifica todos los cargos que aparezcan en la factura por encima del subtotal. Incluye impuestos como IVA o impuestos a las ventas, y detalla cualquier cargo adicional o recargo con su descripción y monto. Las retenciones deben corresponder exclusivamente a conceptos fiscales o tributarios (como Ganancias, IVA, IIBB). No incluyas descuentos comerciales, promociones ni bonificaciones bajo la categoría de retenciones. Estos deben clasificarse por separado o ser ignorados si no corresponden a un cargo sobre el subtotal.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Parties,
    LineItems,
    Taxes,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [TaskKind::Parties, TaskKind::LineItems, TaskKind::Taxes];

    /// Tool name sent to the model.
    pub fn tool_name(&self) -> &'static str {
        match self {
            TaskKind::Parties => "datos_del_emisor_y_receptor",
            TaskKind::LineItems => "detalle_de_items_facturados",
            TaskKind::Taxes => "impuestos_y_retenciones_de_la_factura",
        }
    }

    /// Key under which the output lands in the aggregated invoice data.
    pub fn category(&self) -> &'static str {
        match self {
            TaskKind::Parties => "emisor_receptor",
            TaskKind::LineItems => "items",
            TaskKind::Taxes => "impuestos",
        }
    }

    pub fn from_tool_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tool_name() == name)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tool_name())
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionTask {
    pub kind: TaskKind,
    pub description: String,
    pub prompt: String,
    pub schema: Value,
}

impl ExtractionTask {
    pub fn name(&self) -> &'static str {
        self.kind.tool_name()
    }

    pub fn tool_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description.clone(),
            input_schema: self.schema.clone(),
        }
    }
}

/// Ordered task list. The first task is the one run alone under
/// first-then-parallel ordering.
#[derive(Debug, Clone)]
pub struct TaskCatalog {
    tasks: Vec<ExtractionTask>,
}

impl TaskCatalog {
    pub fn standard() -> Result<Self, ExtractionError> {
        Ok(Self {
            tasks: vec![
                load_task(
                    TaskKind::Parties,
                    "Extrae y gestiona los datos clave de un comprobante fiscal, incluyendo datos del emisor y del receptor con validación de enums.",
                    PARTIES_PROMPT,
                    PARTIES_SCHEMA,
                )?,
                load_task(
                    TaskKind::LineItems,
                    "Extrae y valida los detalles de ítems facturados junto con totales e impuestos.",
                    LINE_ITEMS_PROMPT,
                    LINE_ITEMS_SCHEMA,
                )?,
                load_task(
                    TaskKind::Taxes,
                    "Extrae, valida y estructura la información de impuestos y retenciones de una factura.",
                    TAXES_PROMPT,
                    TAXES_SCHEMA,
                )?,
            ],
        })
    }

    pub fn new(tasks: Vec<ExtractionTask>) -> Self {
        Self { tasks }
    }

    pub fn get(&self, kind: TaskKind) -> Option<&ExtractionTask> {
        self.tasks.iter().find(|task| task.kind == kind)
    }

    pub fn first(&self) -> Option<&ExtractionTask> {
        self.tasks.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtractionTask> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Every tool is offered on every request; `tool_choice` picks one.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tasks.iter().map(ExtractionTask::tool_definition).collect()
    }
}

fn load_task(
    kind: TaskKind,
    description: &str,
    prompt: &str,
    schema: &str,
) -> Result<ExtractionTask, ExtractionError> {
    let schema = serde_json::from_str(schema).map_err(|e| ExtractionError::InvalidSchema {
        task: kind,
        message: e.to_string(),
    })?;

    Ok(ExtractionTask {
        kind,
        description: description.to_string(),
        prompt: prompt.to_string(),
        schema,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog_order() {
        let catalog = TaskCatalog::standard().unwrap();
        let kinds: Vec<TaskKind> = catalog.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, TaskKind::ALL.to_vec());
        assert_eq!(catalog.first().unwrap().kind, TaskKind::Parties);
    }

    #[test]
    fn test_tool_names_round_trip() {
        for kind in TaskKind::ALL {
            assert_eq!(TaskKind::from_tool_name(kind.tool_name()), Some(kind));
        }
        assert_eq!(TaskKind::from_tool_name("unknown"), None);
    }

    #[test]
    fn test_categories() {
        assert_eq!(TaskKind::Parties.category(), "emisor_receptor");
        assert_eq!(TaskKind::LineItems.category(), "items");
        assert_eq!(TaskKind::Taxes.category(), "impuestos");
    }

    #[test]
    fn test_schemas_are_objects() {
        let catalog = TaskCatalog::standard().unwrap();
        for task in catalog.iter() {
            assert_eq!(task.schema["type"], "object", "{}", task.name());
            assert!(!task.prompt.is_empty());
        }
    }

    #[test]
    fn test_tool_definitions_cover_all_tasks() {
        let catalog = TaskCatalog::standard().unwrap();
        let names: Vec<String> = catalog
            .tool_definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "datos_del_emisor_y_receptor",
                "detalle_de_items_facturados",
                "impuestos_y_retenciones_de_la_factura"
            ]
        );
    }
}
