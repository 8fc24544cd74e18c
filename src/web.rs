#![cfg(feature = "web")]
#![cfg(not(tarpaulin_include))]

use js_sys::{Function, Reflect, Uint8Array};
use wasm_bindgen::prelude::*;

use crate::downloader::export_file_name;
use crate::engine::Edit;
use crate::error::{GradeError, GradeResult};
use crate::loader::{ImportTicket, import_remote_json};
use crate::saving::KeyValueStore;
use crate::session::GradeApp;

/// `KeyValueStore` over a browser `Storage` object such as `localStorage`.
pub struct JsStore {
    storage: JsValue,
}

impl JsStore {
    fn method(&self, name: &str) -> GradeResult<Function> {
        Reflect::get(&self.storage, &JsValue::from_str(name))
            .map_err(js_error)?
            .dyn_into::<Function>()
            .map_err(|_| GradeError::Storage(format!("storage has no {} method", name)))
    }
}

impl KeyValueStore for JsStore {
    fn get(&self, key: &str) -> GradeResult<Option<String>> {
        let value = self
            .method("getItem")?
            .call1(&self.storage, &JsValue::from_str(key))
            .map_err(js_error)?;
        Ok(value.as_string())
    }

    fn set(&mut self, key: &str, value: &str) -> GradeResult<()> {
        self.method("setItem")?
            .call2(&self.storage, &JsValue::from_str(key), &JsValue::from_str(value))
            .map_err(js_error)?;
        Ok(())
    }
}

fn js_error(value: JsValue) -> GradeError {
    GradeError::Storage(value.as_string().unwrap_or_else(|| format!("{:?}", value)))
}

fn to_js(err: GradeError) -> JsValue {
    JsValue::from_str(&err.user_message())
}

fn book_json(app: &GradeApp<JsStore>) -> Result<String, JsValue> {
    serde_json::to_string(app.book()).map_err(|e| to_js(e.into()))
}

/// Grade app handle for the browser. Every method returning a book returns
/// it as JSON in the persisted camelCase shape.
#[wasm_bindgen]
pub struct WebGradeApp {
    inner: GradeApp<JsStore>,
}

#[wasm_bindgen]
impl WebGradeApp {
    #[wasm_bindgen(constructor)]
    pub fn new(storage: JsValue) -> WebGradeApp {
        WebGradeApp {
            inner: GradeApp::load(JsStore { storage }),
        }
    }

    pub fn book(&self) -> Result<String, JsValue> {
        book_json(&self.inner)
    }

    pub fn theme(&self) -> String {
        self.inner.settings().theme.as_str().to_string()
    }

    #[wasm_bindgen(js_name = toggleTheme)]
    pub fn toggle_theme(&mut self) -> String {
        self.inner.toggle_theme().as_str().to_string()
    }

    /// Applies one edit given as JSON, e.g.
    /// `{"type":"cumulativeTarget","value":"8"}`.
    pub fn apply(&mut self, edit_json: &str) -> Result<String, JsValue> {
        let edit: Edit = serde_json::from_str(edit_json).map_err(|e| to_js(e.into()))?;
        self.inner.apply(&edit).map_err(to_js)?;
        book_json(&self.inner)
    }

    pub fn summaries(&self) -> Result<String, JsValue> {
        let semesters: Vec<_> = self.inner.book().semesters.iter().map(|s| s.summary()).collect();
        let payload = serde_json::json!({
            "semesters": semesters,
            "cumulative": self.inner.cumulative_summary(),
        });
        Ok(payload.to_string())
    }

    #[wasm_bindgen(js_name = openEditor)]
    pub fn open_editor(&mut self, semester: usize, subject: usize) -> Result<String, JsValue> {
        let subject = self.inner.open_editor(semester, subject).map_err(to_js)?;
        serde_json::to_string(subject).map_err(|e| to_js(e.into()))
    }

    #[wasm_bindgen(js_name = closeEditor)]
    pub fn close_editor(&mut self) {
        self.inner.close_editor();
    }

    #[wasm_bindgen(js_name = cancelEditor)]
    pub fn cancel_editor(&mut self) -> Result<String, JsValue> {
        self.inner.cancel_editor().map_err(to_js)?;
        book_json(&self.inner)
    }

    #[wasm_bindgen(js_name = importPdf)]
    pub fn import_pdf(&mut self, bytes: &Uint8Array) -> Result<String, JsValue> {
        self.inner.import_pdf(&bytes.to_vec()).map_err(to_js)?;
        book_json(&self.inner)
    }

    /// Two-step import for the asynchronous upload path: take a ticket before
    /// the request, hand it back with the response body.
    #[wasm_bindgen(js_name = beginImport)]
    pub fn begin_import(&mut self) -> f64 {
        self.inner.begin_import().value() as f64
    }

    #[wasm_bindgen(js_name = finishRemoteImport)]
    pub fn finish_remote_import(&mut self, ticket: f64, json: &str) -> Result<String, JsValue> {
        let ticket = ImportTicket::from_value(ticket as u64);
        let result = import_remote_json(json);
        self.inner.finish_import(ticket, result).map_err(to_js)?;
        book_json(&self.inner)
    }

    #[wasm_bindgen(js_name = exportXlsx)]
    pub fn export_xlsx(&self) -> Result<Uint8Array, JsValue> {
        let bytes = self.inner.export_xlsx().map_err(to_js)?;
        Ok(Uint8Array::from(&bytes[..]))
    }

    #[wasm_bindgen(js_name = exportFileName)]
    pub fn export_file_name(&self) -> String {
        export_file_name(chrono::Local::now().date_naive())
    }
}
