use super::Notebook;
use super::state::fresh_id;
use crate::error::{Result, ScopecalcError};
use log::info;
use scopecalc_engine::engine::{
    CompileDiagnostic, DEFAULT_COLOR_TAG, FunctionModule, is_keyword, is_valid_identifier,
};

impl Notebook {
    fn module_position(&self, module_id: &str) -> Result<usize> {
        self.modules
            .iter()
            .position(|m| m.id == module_id)
            .ok_or_else(|| ScopecalcError::UnknownModule(module_id.to_string()))
    }

    fn validate_module_name(&self, name: &str, except_id: Option<&str>) -> Result<String> {
        let name = name.trim();
        if !is_valid_identifier(name) || is_keyword(name) {
            return Err(ScopecalcError::InvalidModuleName(name.to_string()));
        }
        if self
            .modules
            .iter()
            .any(|m| Some(m.id.as_str()) != except_id && m.name == name)
        {
            return Err(ScopecalcError::DuplicateModuleName(name.to_string()));
        }
        Ok(name.to_string())
    }

    /// Create a module seeded from the configured template. Returns its id.
    pub fn add_module(&mut self, name: &str) -> Result<String> {
        let name = self.validate_module_name(name, None)?;
        let source = self.module_defaults.template.replace("{name}", &name);
        let mut module = FunctionModule::new(fresh_id("set"), name, source);
        let tags = &self.module_defaults.color_tags;
        module.color_tag = if tags.is_empty() {
            DEFAULT_COLOR_TAG.to_string()
        } else {
            tags[self.modules.len() % tags.len()].clone()
        };
        info!("added module {} ({})", module.name, module.id);
        let id = module.id.clone();
        self.modules.push(module);
        self.recompute_all();
        Ok(id)
    }

    /// Replace a module's source. The module is marked unsaved.
    pub fn update_module_source(&mut self, module_id: &str, source: &str) -> Result<()> {
        let pos = self.module_position(module_id)?;
        let module = &mut self.modules[pos];
        module.source_code = source.to_string();
        module.is_saved = false;
        self.recompute_all();
        Ok(())
    }

    pub fn save_module(&mut self, module_id: &str) -> Result<()> {
        let pos = self.module_position(module_id)?;
        self.modules[pos].is_saved = true;
        self.modified = true;
        Ok(())
    }

    /// Rename a module. Lines still calling the old name become undefined.
    pub fn rename_module(&mut self, module_id: &str, name: &str) -> Result<()> {
        let pos = self.module_position(module_id)?;
        let name = self.validate_module_name(name, Some(module_id))?;
        let module = &mut self.modules[pos];
        module.name = name;
        module.is_saved = false;
        self.recompute_all();
        Ok(())
    }

    pub fn delete_module(&mut self, module_id: &str) -> Result<()> {
        let pos = self.module_position(module_id)?;
        let module = self.modules.remove(pos);
        info!("deleted module {} ({})", module.name, module.id);
        self.recompute_all();
        Ok(())
    }

    /// Definitions in the module's source that failed to compile.
    pub fn module_diagnostics(&self, module_id: &str) -> Result<Vec<CompileDiagnostic>> {
        let pos = self.module_position(module_id)?;
        Ok(self.modules[pos].compile().diagnostics)
    }
}
