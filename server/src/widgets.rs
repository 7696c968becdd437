//! In-memory `widgets` resource served at `/widgets` and `/widgets/:id`.

use dashmap::DashMap;
use restgate_core::{Attributes, Controller, HttpError, Invocation, Payload, Resource};
use uuid::Uuid;

pub const RESOURCE_TYPE: &str = "widgets";

#[derive(Debug, Default)]
pub struct WidgetController {
    store: DashMap<String, Attributes>,
}

impl WidgetController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn resource(id: &str, attributes: Attributes) -> Result<Resource, HttpError> {
        Ok(Resource::new(RESOURCE_TYPE, attributes)?.with_id(id))
    }

    /// The request document, checked to describe a widget.
    fn widget_document(call: &Invocation<'_>) -> Result<Resource, HttpError> {
        let resource = call.document()?;
        if resource.resource_type() != RESOURCE_TYPE {
            return Err(HttpError::ValidationError(format!(
                "expected resource type '{RESOURCE_TYPE}', got '{}'",
                resource.resource_type()
            )));
        }
        Ok(resource)
    }

    fn not_found(id: &str) -> HttpError {
        HttpError::NotFound(format!("Widget '{id}' not found"))
    }
}

impl Controller for WidgetController {
    fn create(&self, call: &Invocation<'_>) -> Result<Payload, HttpError> {
        if call.path_param("id").is_some() {
            return Err(call.unsupported());
        }
        let widget = Self::widget_document(call)?;
        let id = Uuid::new_v4().to_string();
        self.store.insert(id.clone(), widget.attributes().clone());
        tracing::info!(%id, "widget created");
        Ok(Self::resource(&id, widget.attributes().clone())?.into())
    }

    fn retrieve(&self, call: &Invocation<'_>) -> Result<Payload, HttpError> {
        if let Some(id) = call.path_param("id") {
            let attributes = self
                .store
                .get(id)
                .map(|entry| entry.value().clone())
                .ok_or_else(|| Self::not_found(id))?;
            return Ok(Self::resource(id, attributes)?.into());
        }

        let mut rows: Vec<(String, Attributes)> = self
            .store
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        let widgets = rows
            .into_iter()
            .map(|(id, attributes)| Self::resource(&id, attributes))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(widgets.into())
    }

    fn update(&self, call: &Invocation<'_>) -> Result<Payload, HttpError> {
        let Some(id) = call.path_param("id") else {
            return Err(call.unsupported());
        };
        let widget = Self::widget_document(call)?;
        if let Some(body_id) = widget.id().filter(|body_id| *body_id != id) {
            return Err(HttpError::ValidationError(format!(
                "document id '{body_id}' does not match '{id}'"
            )));
        }

        let mut stored = self.store.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        for (name, value) in widget.attributes() {
            stored.insert(name.clone(), value.clone());
        }
        let attributes = stored.value().clone();
        drop(stored);
        tracing::info!(%id, "widget updated");
        Ok(Self::resource(id, attributes)?.into())
    }

    fn delete(&self, call: &Invocation<'_>) -> Result<Payload, HttpError> {
        let Some(id) = call.path_param("id") else {
            return Err(call.unsupported());
        };
        self.store.remove(id).ok_or_else(|| Self::not_found(id))?;
        tracing::info!(%id, "widget deleted");
        Ok(Payload::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restgate_core::{HttpMethod, PathParams, PathPattern, PrimaryData, Request, RouteMatcher};
    use serde_json::json;

    const GEAR: &str = r#"{"data":{"type":"widgets","attributes":{"name":"gear","teeth":12}}}"#;

    fn params(uri: &str) -> PathParams {
        PathPattern::new("/widgets/:id")
            .matches(uri)
            .unwrap_or_default()
    }

    fn call<T>(request: &Request, f: impl FnOnce(&Invocation<'_>) -> T) -> T {
        f(&Invocation::new(request, params(request.uri())))
    }

    fn create(widgets: &WidgetController) -> String {
        let request = Request::builder(HttpMethod::Post).uri("/widgets").body(GEAR).build();
        let payload = call(&request, |c| widgets.create(c)).unwrap();
        match payload.data {
            PrimaryData::One(resource) => resource.id().unwrap().to_string(),
            other => panic!("unexpected data {other:?}"),
        }
    }

    #[test]
    fn create_then_retrieve() {
        let widgets = WidgetController::new();
        let id = create(&widgets);
        assert_eq!(widgets.len(), 1);

        let request = Request::builder(HttpMethod::Get).uri(format!("/widgets/{id}")).build();
        let payload = call(&request, |c| widgets.retrieve(c)).unwrap();
        let PrimaryData::One(resource) = payload.data else {
            panic!("expected one resource");
        };
        assert_eq!(resource.attribute("teeth"), Some(&json!(12)));
    }

    #[test]
    fn list_returns_every_widget() {
        let widgets = WidgetController::new();
        create(&widgets);
        create(&widgets);
        let request = Request::builder(HttpMethod::Get).uri("/widgets").build();
        let payload = call(&request, |c| widgets.retrieve(c)).unwrap();
        assert!(matches!(payload.data, PrimaryData::Many(ref all) if all.len() == 2));
    }

    #[test]
    fn update_merges_attributes() {
        let widgets = WidgetController::new();
        let id = create(&widgets);
        let request = Request::builder(HttpMethod::Put)
            .uri(format!("/widgets/{id}"))
            .body(r#"{"data":{"type":"widgets","attributes":{"teeth":16}}}"#)
            .build();
        let payload = call(&request, |c| widgets.update(c)).unwrap();
        let PrimaryData::One(resource) = payload.data else {
            panic!("expected one resource");
        };
        assert_eq!(resource.attribute("name"), Some(&json!("gear")));
        assert_eq!(resource.attribute("teeth"), Some(&json!(16)));
    }

    #[test]
    fn update_rejects_mismatched_id() {
        let widgets = WidgetController::new();
        let id = create(&widgets);
        let request = Request::builder(HttpMethod::Put)
            .uri(format!("/widgets/{id}"))
            .body(r#"{"data":{"type":"widgets","id":"other","attributes":{"teeth":16}}}"#)
            .build();
        let err = call(&request, |c| widgets.update(c)).unwrap_err();
        assert!(matches!(err, HttpError::ValidationError(_)));
    }

    #[test]
    fn wrong_type_is_rejected() {
        let widgets = WidgetController::new();
        let request = Request::builder(HttpMethod::Post)
            .uri("/widgets")
            .body(r#"{"data":{"type":"gadgets","attributes":{"name":"x"}}}"#)
            .build();
        let err = call(&request, |c| widgets.create(c)).unwrap_err();
        assert!(matches!(err, HttpError::ValidationError(_)));
        assert!(widgets.is_empty());
    }

    #[test]
    fn delete_then_missing() {
        let widgets = WidgetController::new();
        let id = create(&widgets);
        let request = Request::builder(HttpMethod::Delete).uri(format!("/widgets/{id}")).build();
        let payload = call(&request, |c| widgets.delete(c)).unwrap();
        assert_eq!(payload.data, PrimaryData::Empty);

        let err = call(&request, |c| widgets.delete(c)).unwrap_err();
        assert_eq!(err, HttpError::NotFound(format!("Widget '{id}' not found")));
    }

    #[test]
    fn collection_rejects_put_and_delete() {
        let widgets = WidgetController::new();
        let request = Request::builder(HttpMethod::Delete).uri("/widgets").build();
        let err = call(&request, |c| widgets.delete(c)).unwrap_err();
        assert!(matches!(err, HttpError::UnsupportedMethod { .. }));
    }
}
