// Form state for editing a single record
//
// Values are kept as text while the user types and only turned into a typed
// entity on save. Reference and choice fields cycle through a fixed list.

use crate::domain::{Choice, Table};
use crate::entities::RowKey;
use crate::error::Result;
use crate::validation::{Field, FieldKind, ValidationError};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::str::FromStr;

// ============================================================================
// FORM VALUES
// ============================================================================

/// Raw text entered for each field, plus display labels of chosen references
#[derive(Debug, Clone, Default)]
pub struct FormValues {
    fields: &'static [Field],
    values: Vec<(&'static str, String)>,
    labels: Vec<(&'static str, String)>,
}

impl FormValues {
    pub fn new(fields: &'static [Field]) -> Self {
        FormValues {
            fields,
            values: Vec::new(),
            labels: Vec::new(),
        }
    }

    pub fn set(mut self, column: &'static str, value: impl Into<String>) -> Self {
        self.values.retain(|(c, _)| *c != column);
        self.values.push((column, value.into()));
        self
    }

    pub fn with_label(mut self, column: &'static str, label: impl Into<String>) -> Self {
        self.labels.retain(|(c, _)| *c != column);
        self.labels.push((column, label.into()));
        self
    }

    fn raw(&self, column: &str) -> &str {
        self.values
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, v)| v.trim())
            .unwrap_or("")
    }

    fn field(&self, column: &'static str) -> Field {
        self.fields
            .iter()
            .find(|f| f.column == column)
            .copied()
            .unwrap_or(Field::text(column, column, usize::MAX))
    }

    /// Trimmed text, empty when missing
    pub fn text(&self, column: &str) -> String {
        self.raw(column).to_string()
    }

    pub fn optional_text(&self, column: &str) -> Option<String> {
        let raw = self.raw(column);
        (!raw.is_empty()).then(|| raw.to_string())
    }

    pub fn label(&self, column: &str) -> Option<String> {
        self.labels
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, label)| label.clone())
    }

    pub fn reference(&self, column: &'static str) -> Result<Option<i64>, ValidationError> {
        let raw = self.raw(column);
        if raw.is_empty() {
            return Ok(None);
        }

        raw.parse().map(Some).map_err(|_| {
            let field = self.field(column);
            ValidationError::invalid(&field, raw, format!("{} must be a row id", field.caption))
        })
    }

    pub fn date(&self, column: &'static str) -> Result<Option<NaiveDate>, ValidationError> {
        let raw = self.raw(column);
        if raw.is_empty() {
            return Ok(None);
        }

        NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(Some).map_err(|_| {
            let field = self.field(column);
            ValidationError::invalid(
                &field,
                raw,
                format!("{} must be a date (YYYY-MM-DD)", field.caption),
            )
        })
    }

    pub fn parsed<T: FromStr>(&self, column: &'static str) -> Result<Option<T>, ValidationError> {
        let raw = self.raw(column);
        if raw.is_empty() {
            return Ok(None);
        }

        raw.parse().map(Some).map_err(|_| {
            let field = self.field(column);
            let message = match field.kind {
                FieldKind::Choice(options) => {
                    format!("{} must be one of {}", field.caption, options.join(", "))
                }
                _ => format!("Invalid {}", field.caption.to_lowercase()),
            };
            ValidationError::invalid(&field, raw, message)
        })
    }
}

// ============================================================================
// FORM
// ============================================================================

/// An open edit form
#[derive(Debug, Clone)]
pub struct Form {
    pub table: Table,
    /// Key of the row being edited; None when inserting
    pub original: Option<RowKey>,
    pub fields: &'static [Field],
    pub values: Vec<String>,
    pub focus: usize,
    /// Options for reference fields, indexed like `fields`
    choices: Vec<Vec<Choice>>,
}

impl Form {
    /// Blank form; `master` pre-fills the reference to the selected master row
    pub fn for_insert(conn: &Connection, table: Table, master: Option<i64>) -> Result<Self> {
        let mut form = Self::blank(conn, table, None)?;

        if let (Some(master_id), Some(column)) = (master, table.master_column()) {
            if let Some(index) = form.fields.iter().position(|f| f.column == column) {
                form.values[index] = master_id.to_string();
            }
        }

        Ok(form)
    }

    /// Form holding the current values of an existing row
    pub fn for_update(conn: &Connection, table: Table, key: RowKey) -> Result<Self> {
        let mut form = Self::blank(conn, table, Some(key))?;
        form.values = table.form_values(conn, key)?;
        Ok(form)
    }

    fn blank(conn: &Connection, table: Table, original: Option<RowKey>) -> Result<Self> {
        let fields = table.fields();

        let mut choices = Vec::with_capacity(fields.len());
        for field in fields {
            choices.push(match field.kind {
                FieldKind::Reference(target) => target.lookup_choices(conn)?,
                _ => Vec::new(),
            });
        }

        Ok(Form {
            table,
            original,
            fields,
            values: vec![String::new(); fields.len()],
            focus: 0,
            choices,
        })
    }

    pub fn is_insert(&self) -> bool {
        self.original.is_none()
    }

    pub fn title(&self) -> String {
        let action = if self.is_insert() { "New" } else { "Edit" };
        format!("{} - {}", self.table.caption(), action)
    }

    // ------------------------------------------------------------------------
    // Focus
    // ------------------------------------------------------------------------

    pub fn next_field(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + 1) % self.fields.len();
        }
    }

    pub fn previous_field(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + self.fields.len() - 1) % self.fields.len();
        }
    }

    /// Focus the field with this column, e.g. the one a validation error names
    pub fn focus_column(&mut self, column: &str) {
        if let Some(index) = self.fields.iter().position(|f| f.column == column) {
            self.focus = index;
        }
    }

    // ------------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------------

    fn focused_kind(&self) -> Option<FieldKind> {
        self.fields.get(self.focus).map(|f| f.kind)
    }

    /// Type a character into a text or date field
    pub fn input(&mut self, c: char) {
        if let Some(FieldKind::Text { .. } | FieldKind::Date) = self.focused_kind() {
            self.values[self.focus].push(c);
        }
    }

    pub fn backspace(&mut self) {
        match self.focused_kind() {
            Some(FieldKind::Text { .. } | FieldKind::Date) => {
                self.values[self.focus].pop();
            }
            Some(_) => self.values[self.focus].clear(),
            None => {}
        }
    }

    /// Step a reference or choice field through its options
    ///
    /// Nullable fields include an empty option before the first entry.
    pub fn cycle(&mut self, forward: bool) {
        let Some(field) = self.fields.get(self.focus) else {
            return;
        };

        let mut options: Vec<String> = match field.kind {
            FieldKind::Reference(_) => self.choices[self.focus]
                .iter()
                .map(|c| c.id.to_string())
                .collect(),
            FieldKind::Choice(names) => names.iter().map(|n| n.to_string()).collect(),
            _ => return,
        };
        if field.nullable {
            options.insert(0, String::new());
        }
        if options.is_empty() {
            return;
        }

        let current = options.iter().position(|o| *o == self.values[self.focus]);
        let next = match (current, forward) {
            (None, true) => 0,
            (None, false) => options.len() - 1,
            (Some(i), true) => (i + 1) % options.len(),
            (Some(i), false) => (i + options.len() - 1) % options.len(),
        };
        self.values[self.focus] = options[next].clone();
    }

    /// What the user sees for a field: reference ids are shown by label
    pub fn display_value(&self, index: usize) -> String {
        let value = &self.values[index];
        match self.fields[index].kind {
            FieldKind::Reference(_) => self.choice_label(index, value).unwrap_or_else(|| value.clone()),
            _ => value.clone(),
        }
    }

    fn choice_label(&self, index: usize, value: &str) -> Option<String> {
        let id: i64 = value.parse().ok()?;
        self.choices[index]
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.label.clone())
    }

    pub fn form_values(&self) -> FormValues {
        let mut form = FormValues::new(self.fields);
        for (index, field) in self.fields.iter().enumerate() {
            form = form.set(field.column, self.values[index].clone());
            if let Some(label) = self.choice_label(index, &self.values[index]) {
                form = form.with_label(field.column, label);
            }
        }
        form
    }

    /// Insert or update the row; returns its (possibly new) key
    pub fn save(&self, conn: &Connection) -> Result<RowKey> {
        self.table.save(conn, self.original, &self.form_values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{seed_demo_data, setup_database};
    use crate::error::Error;
    use crate::validation::ValidationKind;

    fn demo() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        seed_demo_data(&conn).unwrap();
        conn
    }

    #[test]
    fn test_form_values_parse_dates_and_references() {
        let values = FormValues::new(Table::Pet.fields())
            .set("birth_date", "2012-08-06")
            .set("owner_id", " 2 ");

        assert_eq!(
            values.date("birth_date").unwrap(),
            NaiveDate::from_ymd_opt(2012, 8, 6)
        );
        assert_eq!(values.reference("owner_id").unwrap(), Some(2));
        assert_eq!(values.reference("type_id").unwrap(), None);
    }

    #[test]
    fn test_bad_date_reported_on_date_field() {
        let values = FormValues::new(Table::Pet.fields()).set("birth_date", "06/08/2012");

        let err = values.date("birth_date").unwrap_err();
        assert_eq!(err.kind, ValidationKind::InvalidValue);
        assert_eq!(err.field, "birth_date");
        assert_eq!(err.value.as_deref(), Some("06/08/2012"));
        assert_eq!(err.message, "Birth date must be a date (YYYY-MM-DD)");
    }

    #[test]
    fn test_insert_form_prefills_master_reference() {
        let conn = demo();

        let form = Form::for_insert(&conn, Table::Pet, Some(3)).unwrap();
        let owner = form.fields.iter().position(|f| f.column == "owner_id").unwrap();

        assert!(form.is_insert());
        assert_eq!(form.values[owner], "3");
        assert_eq!(form.display_value(owner), "Rodriquez, Eduardo");
    }

    #[test]
    fn test_update_form_loads_row_and_saves_changes() {
        let conn = demo();

        let mut form = Form::for_update(&conn, Table::Owner, RowKey::Id(1)).unwrap();
        assert_eq!(form.values[0], "George");
        assert_eq!(form.values[1], "Franklin");

        form.focus_column("city");
        form.backspace();
        form.input('X');
        let key = form.save(&conn).unwrap();
        assert_eq!(key, RowKey::Id(1));

        let owner = crate::edit::select_by_key::<crate::entities::Owner>(&conn, 1)
            .unwrap()
            .unwrap();
        assert_eq!(owner.city.as_deref(), Some("MadisoX"));
    }

    #[test]
    fn test_cycle_reference_choices() {
        let conn = demo();

        let mut form = Form::for_insert(&conn, Table::VetSpecialty, None).unwrap();
        form.focus_column("specialty");

        // required field: no empty option, specialties ordered by name
        form.cycle(true);
        assert_eq!(form.display_value(1), "dentistry");
        form.cycle(true);
        assert_eq!(form.display_value(1), "radiology");
        form.cycle(false);
        form.cycle(false);
        assert_eq!(form.display_value(1), "surgery");
    }

    #[test]
    fn test_cycle_choice_includes_empty_for_nullable() {
        let conn = demo();

        let mut form = Form::for_insert(&conn, Table::Owner, None).unwrap();
        form.focus_column("phone_type");
        let index = form.focus;

        // starts on the empty option
        form.cycle(true);
        assert_eq!(form.values[index], "MOBILE");
        form.cycle(false);
        assert_eq!(form.values[index], "");
        form.cycle(false);
        assert_eq!(form.values[index], "WORK");
    }

    #[test]
    fn test_duplicate_link_from_form_names_specialty() {
        let conn = demo();

        let mut form = Form::for_insert(&conn, Table::VetSpecialty, Some(3)).unwrap();
        form.focus_column("specialty");
        form.values[form.focus] = "2".to_string();

        match form.save(&conn) {
            Err(Error::Validation(err)) => {
                assert_eq!(err.kind, ValidationKind::DuplicateAssociation);
                assert_eq!(err.field, "specialty");
                assert_eq!(err.value.as_deref(), Some("surgery"));
            }
            other => panic!("expected duplicate rejection, got {:?}", other),
        }
    }
}
