use tracing::debug;

use super::{FuncId, Function, FunctionType};

#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    functions: Vec<Function>,
}

impl Module {
    pub fn new(name: &str) -> Module {
        Module {
            name: name.to_string(),
            functions: vec![],
        }
    }

    pub fn add_function(&mut self, function: Function) -> FuncId {
        let id = FuncId(self.functions.len());
        self.functions.push(function);
        id
    }

    pub fn get_function(&self, name: &str) -> Option<FuncId> {
        self.functions
            .iter()
            .position(|f| f.name == name)
            .map(FuncId)
    }

    /// Looks a function up by name and declares it if it isn't there yet
    pub fn get_or_insert_function(&mut self, name: &str, ty: FunctionType) -> FuncId {
        match self.get_function(name) {
            Some(id) => id,
            None => {
                debug!("declaring external function {} : {}", name, ty);
                self.add_function(Function::new(name, ty))
            }
        }
    }

    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.0]
    }

    pub fn function_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.functions[id.0]
    }

    pub fn functions(&self) -> impl Iterator<Item = (FuncId, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, f)| (FuncId(i), f))
    }
}
