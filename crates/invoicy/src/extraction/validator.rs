use jsonschema::Validator;
use serde_json::Value;
use std::collections::HashMap;

use super::error::ExtractionError;
use super::tasks::{TaskCatalog, TaskKind};

/// Compiled task schemas, the gate every candidate output passes before it is
/// accepted.
pub struct SchemaValidator {
    validators: HashMap<TaskKind, Validator>,
}

impl SchemaValidator {
    pub fn new(catalog: &TaskCatalog) -> Result<Self, ExtractionError> {
        let mut validators = HashMap::new();
        for task in catalog.iter() {
            let validator =
                jsonschema::validator_for(&task.schema).map_err(|e| ExtractionError::InvalidSchema {
                    task: task.kind,
                    message: e.to_string(),
                })?;
            validators.insert(task.kind, validator);
        }
        Ok(Self { validators })
    }

    /// Returns every violation joined into one message.
    pub fn validate(&self, kind: TaskKind, candidate: &Value) -> Result<(), String> {
        let Some(validator) = self.validators.get(&kind) else {
            return Err(format!("no schema registered for '{}'", kind));
        };

        let errors: Vec<String> = validator
            .iter_errors(candidate)
            .map(|e| e.to_string())
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }
}

impl std::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("tasks", &self.validators.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator() -> SchemaValidator {
        SchemaValidator::new(&TaskCatalog::standard().unwrap()).unwrap()
    }

    #[test]
    fn test_valid_line_items() {
        let candidate = json!({
            "detalles": [
                { "descripcion": "Servicio", "cantidad": 1, "precio_unitario": 100.0, "precio_total": 100.0 }
            ],
            "subtotal": 100.0,
            "total": 121.0
        });
        assert!(validator().validate(TaskKind::LineItems, &candidate).is_ok());
    }

    #[test]
    fn test_missing_required_field() {
        let candidate = json!({ "detalles": [], "subtotal": 100.0 });
        let message = validator()
            .validate(TaskKind::LineItems, &candidate)
            .unwrap_err();
        assert!(message.contains("total"), "{}", message);
    }

    #[test]
    fn test_enum_violation_is_reported() {
        let candidate = json!({
            "comprobante": {
                "tipo": "Recibo",
                "jurisdiccion_fiscal": "Argentina",
                "numero": "1",
                "fecha_emision": "2024-01-01",
                "moneda": "ARS"
            },
            "emisor": { "nombre": "A", "id_fiscal": "1" },
            "receptor": { "nombre": "B" }
        });
        assert!(validator().validate(TaskKind::Parties, &candidate).is_err());
    }

    #[test]
    fn test_all_violations_are_joined() {
        let candidate = json!({ "impuestos": "x", "retenciones": 3 });
        let message = validator().validate(TaskKind::Taxes, &candidate).unwrap_err();
        assert!(message.contains("; "), "{}", message);
    }

    #[test]
    fn test_nullable_withholding_description() {
        let candidate = json!({
            "impuestos": [{ "tipo": "IVA", "base_imponible": 100.0, "importe": 21.0, "alicuota": null }],
            "retenciones": [{ "tipo": "IIBB", "description": null, "base_imponible": 100.0 }]
        });
        assert!(validator().validate(TaskKind::Taxes, &candidate).is_ok());
    }

    #[test]
    fn test_unregistered_kind() {
        let validator = SchemaValidator::new(&TaskCatalog::new(Vec::new())).unwrap();
        assert!(validator.validate(TaskKind::Taxes, &json!({})).is_err());
    }
}
