//! Built-in field layouts for each form kind.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::form::{FieldSpec, FieldType, FormKind, FormTemplate, ValueValidator};

lazy_static! {
    // At least one word of three letters; rejects stray codes like "(1)" or "S/N".
    static ref WORDY: Regex = Regex::new(r"\p{L}{3,}").unwrap();
}

/// Mapping from form kind to its template.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<FormKind, FormTemplate>,
}

impl TemplateRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in template of every form kind.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for kind in FormKind::ALL {
            registry.register(builtin_template(kind));
        }
        registry
    }

    /// Register a template, replacing any previous one for the same kind.
    pub fn register(&mut self, template: FormTemplate) {
        self.templates.insert(template.kind, template);
    }

    pub fn get(&self, kind: FormKind) -> Option<&FormTemplate> {
        self.templates.get(&kind)
    }

    pub fn kinds(&self) -> Vec<FormKind> {
        let mut kinds: Vec<FormKind> = self.templates.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

fn rut_field(name: &str) -> FieldSpec {
    FieldSpec::new(name, FieldType::Rut).with_validator(ValueValidator::ContainsAny(vec!['-']))
}

fn razon_social() -> FieldSpec {
    FieldSpec::new("razon_social", FieldType::Text)
        .label("razon social")
        .label("nombre de la sociedad")
        .label("nombre del emisor")
        .with_validator(ValueValidator::Pattern(WORDY.clone()))
        .critical()
}

fn rut_emisor() -> FieldSpec {
    rut_field("rut_emisor")
        .label("rut emisor")
        .label("rut de la sociedad")
        .label("rut de la entidad")
        .exact_label("rut")
        .critical()
}

/// The built-in template for a form kind.
pub fn builtin_template(kind: FormKind) -> FormTemplate {
    let fields = match kind {
        FormKind::Shareholding => vec![
            razon_social(),
            rut_emisor(),
            FieldSpec::new("nombre_declarante", FieldType::Text)
                .label("nombre del declarante")
                .label("nombre declarante")
                .exact_label("declarante")
                .with_validator(ValueValidator::Pattern(WORDY.clone()))
                .critical(),
            rut_field("rut_declarante")
                .label("rut del declarante")
                .label("rut declarante")
                .critical(),
            FieldSpec::new("fecha_transaccion", FieldType::Date)
                .label("fecha de la transaccion")
                .label("fecha transaccion")
                .label("fecha de operacion")
                .with_row_fallback()
                .critical(),
            FieldSpec::new("numero_acciones", FieldType::Amount)
                .label("numero de acciones")
                .label("n° de acciones")
                .label("cantidad de acciones")
                .with_validator(ValueValidator::Numeric)
                .with_row_fallback()
                .critical(),
            FieldSpec::new("precio_unitario", FieldType::Amount)
                .label("precio unitario")
                .label("precio por accion")
                .with_validator(ValueValidator::Numeric)
                .with_row_fallback(),
            FieldSpec::new("monto_total", FieldType::Amount)
                .label("monto total")
                .label("monto de la transaccion")
                .with_validator(ValueValidator::Numeric)
                .last_match(),
            FieldSpec::new("tipo_operacion", FieldType::Text)
                .label("tipo de operacion")
                .label("naturaleza de la operacion"),
        ],
        FormKind::EssentialFact => vec![
            razon_social(),
            rut_emisor(),
            FieldSpec::new("fecha_hecho", FieldType::Date)
                .label("fecha del hecho")
                .label("fecha hecho esencial")
                .exact_label("fecha")
                .with_row_fallback()
                .critical(),
            FieldSpec::new("materia", FieldType::Text)
                .exact_label("materia")
                .label("materia del hecho")
                .exact_label("asunto")
                .with_row_fallback()
                .critical(),
            FieldSpec::new("representante", FieldType::Text)
                .label("representante legal")
                .label("gerente general")
                .with_validator(ValueValidator::Pattern(WORDY.clone())),
        ],
        FormKind::Dividend => vec![
            razon_social(),
            rut_emisor(),
            FieldSpec::new("fecha_pago", FieldType::Date)
                .label("fecha de pago")
                .label("fecha pago")
                .with_row_fallback()
                .critical(),
            FieldSpec::new("monto_por_accion", FieldType::Amount)
                .label("monto por accion")
                .label("dividendo por accion")
                .label("valor por accion")
                .with_validator(ValueValidator::Numeric)
                .with_row_fallback()
                .critical(),
            FieldSpec::new("fecha_junta", FieldType::Date)
                .label("fecha de la junta")
                .label("fecha junta"),
            FieldSpec::new("tipo_dividendo", FieldType::Text)
                .label("tipo de dividendo")
                .label("clase de dividendo"),
        ],
    };

    FormTemplate::new(kind, fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_covers_all_kinds() {
        let registry = TemplateRegistry::builtin();
        assert_eq!(registry.kinds(), FormKind::ALL.to_vec());
        assert!(TemplateRegistry::new().get(FormKind::Dividend).is_none());
    }

    #[test]
    fn test_critical_fields() {
        let template = builtin_template(FormKind::Dividend);
        let critical: Vec<&str> = template.critical_fields().collect();
        assert_eq!(critical, vec!["razon_social", "rut_emisor", "fecha_pago", "monto_por_accion"]);
    }

    #[test]
    fn test_field_names_unique() {
        for kind in FormKind::ALL {
            let template = builtin_template(kind);
            let mut names: Vec<&str> = template.fields.iter().map(|f| f.name.as_str()).collect();
            let total = names.len();
            names.sort();
            names.dedup();
            assert_eq!(names.len(), total, "duplicate field in {}", kind);
        }
    }
}
