use super::Notebook;
use super::state::{MAX_UNDO_STACK, Scope};
use crate::error::{Result, ScopecalcError};
use log::debug;
use scopecalc_engine::engine::{Line, ModuleSet, evaluate_with_modules};

impl Notebook {
    fn scope_position(&self, scope_id: &str) -> Result<usize> {
        self.scopes
            .iter()
            .position(|s| s.id == scope_id)
            .ok_or_else(|| ScopecalcError::UnknownScope(scope_id.to_string()))
    }

    fn validate_scope_name(&self, name: &str, except_id: Option<&str>) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ScopecalcError::EmptyScopeName);
        }
        let taken = self
            .scopes
            .iter()
            .any(|s| Some(s.id.as_str()) != except_id && s.name.eq_ignore_ascii_case(name));
        if taken {
            return Err(ScopecalcError::DuplicateScopeName(name.to_string()));
        }
        Ok(name.to_string())
    }

    /// Create a scope with one blank line and make it active. Returns its id.
    pub fn create_scope(&mut self, name: &str) -> Result<String> {
        let name = self.validate_scope_name(name, None)?;
        let scope = Scope::new(&name);
        let id = scope.id.clone();
        self.scopes.push(scope);
        self.active_scope_id = Some(id.clone());
        self.modified = true;
        Ok(id)
    }

    pub fn rename_scope(&mut self, scope_id: &str, name: &str) -> Result<()> {
        let pos = self.scope_position(scope_id)?;
        let name = self.validate_scope_name(name, Some(scope_id))?;
        let scope = &mut self.scopes[pos];
        scope.name = name;
        scope.touch();
        self.modified = true;
        Ok(())
    }

    /// Delete a scope. If it was active, the first remaining scope becomes active.
    pub fn delete_scope(&mut self, scope_id: &str) -> Result<()> {
        let pos = self.scope_position(scope_id)?;
        self.scopes.remove(pos);
        self.history.remove(scope_id);
        if self.active_scope_id.as_deref() == Some(scope_id) {
            self.active_scope_id = self.scopes.first().map(|s| s.id.clone());
        }
        self.modified = true;
        Ok(())
    }

    pub fn set_active_scope(&mut self, scope_id: &str) -> Result<()> {
        self.scope_position(scope_id)?;
        self.active_scope_id = Some(scope_id.to_string());
        Ok(())
    }

    /// Move a scope from one position to another.
    pub fn reorder_scopes(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.scopes.len();
        for index in [from, to] {
            if index >= len {
                return Err(ScopecalcError::ScopeOutOfRange { index, len });
            }
        }
        let scope = self.scopes.remove(from);
        self.scopes.insert(to, scope);
        self.modified = true;
        Ok(())
    }

    /// Insert a line at `index` (or append when `None`) and re-evaluate the scope.
    /// An index past the end appends.
    pub fn add_line(&mut self, scope_id: &str, text: &str, index: Option<usize>) -> Result<usize> {
        let pos = self.scope_position(scope_id)?;
        self.push_history(pos);
        let scope = &mut self.scopes[pos];
        let at = index.unwrap_or(scope.lines.len()).min(scope.lines.len());
        scope.lines.insert(at, Line::from_text(at, text));
        self.finish_line_edit(pos);
        Ok(at)
    }

    /// Replace a line's text and re-evaluate the scope.
    pub fn update_line(&mut self, scope_id: &str, index: usize, text: &str) -> Result<()> {
        let pos = self.scope_position(scope_id)?;
        check_line(&self.scopes[pos], index)?;
        self.push_history(pos);
        self.scopes[pos].lines[index].set_text(text);
        self.finish_line_edit(pos);
        Ok(())
    }

    /// Remove a line. A scope that would become empty gets one blank line back.
    pub fn delete_line(&mut self, scope_id: &str, index: usize) -> Result<()> {
        let pos = self.scope_position(scope_id)?;
        check_line(&self.scopes[pos], index)?;
        self.push_history(pos);
        self.scopes[pos].lines.remove(index);
        self.finish_line_edit(pos);
        Ok(())
    }

    /// Move a line to a new position.
    pub fn move_line(&mut self, scope_id: &str, from: usize, to: usize) -> Result<()> {
        let pos = self.scope_position(scope_id)?;
        check_line(&self.scopes[pos], from)?;
        check_line(&self.scopes[pos], to)?;
        self.push_history(pos);
        let lines = &mut self.scopes[pos].lines;
        let line = lines.remove(from);
        lines.insert(to, line);
        self.finish_line_edit(pos);
        Ok(())
    }

    /// Restore the scope's lines to the state before the last line edit.
    pub fn undo(&mut self, scope_id: &str) -> Result<()> {
        let pos = self.scope_position(scope_id)?;
        let previous = self
            .history
            .get_mut(scope_id)
            .and_then(Vec::pop)
            .ok_or(ScopecalcError::NothingToUndo)?;
        self.scopes[pos].lines = previous;
        self.finish_line_edit(pos);
        Ok(())
    }

    /// Re-evaluate one scope against the current modules.
    pub fn recompute_scope(&mut self, scope_id: &str) -> Result<()> {
        let pos = self.scope_position(scope_id)?;
        let modules = ModuleSet::compile(&self.modules);
        self.recompute_at(pos, &modules);
        Ok(())
    }

    /// Re-evaluate every scope. Modules are compiled once for the whole fan-out.
    pub fn recompute_all(&mut self) {
        debug!("recomputing {} scopes", self.scopes.len());
        let modules = ModuleSet::compile(&self.modules);
        for pos in 0..self.scopes.len() {
            self.recompute_at(pos, &modules);
        }
    }

    fn recompute_at(&mut self, pos: usize, modules: &ModuleSet) {
        let scope = &mut self.scopes[pos];
        scope.lines = evaluate_with_modules(&scope.lines, modules);
        scope.touch();
        self.modified = true;
    }

    fn push_history(&mut self, pos: usize) {
        let scope = &self.scopes[pos];
        let stack = self.history.entry(scope.id.clone()).or_default();
        stack.push(scope.lines.clone());
        if stack.len() > MAX_UNDO_STACK {
            stack.remove(0);
        }
    }

    fn finish_line_edit(&mut self, pos: usize) {
        self.scopes[pos].normalize();
        let modules = ModuleSet::compile(&self.modules);
        self.recompute_at(pos, &modules);
    }
}

fn check_line(scope: &Scope, index: usize) -> Result<()> {
    if index >= scope.lines.len() {
        return Err(ScopecalcError::LineOutOfRange {
            index,
            len: scope.lines.len(),
        });
    }
    Ok(())
}
