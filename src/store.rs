use anyhow::Result;
use uuid::Uuid;

use crate::models::{FilterMode, Priority, Task};
use crate::persistence::{load_tasks, save_tasks, KeyValueStore};
use crate::view;

/// Contents of the input panel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InputForm {
    pub text: String,
    pub due_date: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetText(String),
    SetDueDate(String),
    SetPriority(Priority),
    /// Adds a task, or commits the edit when an edit target is set.
    Submit,
    BeginEdit(Uuid),
    CancelEdit,
    Toggle(Uuid),
    Delete(Uuid),
    ClearCompleted,
    SetFilter(FilterMode),
    SetSearch(String),
}

/// Owns the task collection and all view state. Every change goes through
/// [`TaskStore::dispatch`], which writes the collection back to storage once
/// per transition that touched it.
pub struct TaskStore<S: KeyValueStore> {
    storage: S,
    tasks: Vec<Task>,
    form: InputForm,
    edit_target: Option<Uuid>,
    filter: FilterMode,
    search: String,
    default_priority: Priority,
}

impl<S: KeyValueStore> TaskStore<S> {
    pub fn open(storage: S) -> Result<Self> {
        let tasks = load_tasks(&storage)?;
        Ok(TaskStore {
            storage,
            tasks,
            form: InputForm::default(),
            edit_target: None,
            filter: FilterMode::default(),
            search: String::new(),
            default_priority: Priority::default(),
        })
    }

    pub fn with_defaults(mut self, filter: FilterMode, priority: Priority) -> Self {
        self.filter = filter;
        self.default_priority = priority;
        self.form.priority = priority;
        self
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn form(&self) -> &InputForm {
        &self.form
    }

    pub fn edit_target(&self) -> Option<Uuid> {
        self.edit_target
    }

    pub fn is_editing(&self) -> bool {
        self.edit_target.is_some()
    }

    pub fn filter(&self) -> FilterMode {
        self.filter
    }

    pub fn get(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn visible(&self) -> Vec<&Task> {
        view::visible(&self.tasks, self.filter, &self.search)
    }

    pub fn active_count(&self) -> usize {
        view::active_count(&self.tasks)
    }

    #[cfg(test)]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn dispatch(&mut self, action: Action) -> Result<()> {
        log::debug!("dispatch {:?}", action);
        if self.apply(action) {
            save_tasks(&mut self.storage, &self.tasks)?;
        }
        Ok(())
    }

    /// Applies one transition; returns whether the collection changed.
    fn apply(&mut self, action: Action) -> bool {
        match action {
            Action::SetText(text) => {
                self.form.text = text;
                false
            }
            Action::SetDueDate(due) => {
                self.form.due_date = due;
                false
            }
            Action::SetPriority(priority) => {
                self.form.priority = priority;
                false
            }
            Action::Submit => self.submit(),
            Action::BeginEdit(id) => {
                if let Some(task) = self.tasks.iter().find(|t| t.id == id) {
                    self.form = InputForm {
                        text: task.text.clone(),
                        due_date: task.due_date.clone().unwrap_or_default(),
                        priority: task.priority.unwrap_or(self.default_priority),
                    };
                    self.edit_target = Some(id);
                }
                false
            }
            Action::CancelEdit => {
                self.reset_form();
                false
            }
            Action::Toggle(id) => match self.tasks.iter_mut().find(|t| t.id == id) {
                Some(task) => {
                    task.completed = !task.completed;
                    true
                }
                None => false,
            },
            Action::Delete(id) => {
                let before = self.tasks.len();
                self.tasks.retain(|t| t.id != id);
                if self.edit_target == Some(id) {
                    self.reset_form();
                }
                self.tasks.len() != before
            }
            Action::ClearCompleted => {
                let before = self.tasks.len();
                self.tasks.retain(|t| !t.completed);
                if let Some(id) = self.edit_target {
                    if self.get(id).is_none() {
                        self.reset_form();
                    }
                }
                self.tasks.len() != before
            }
            Action::SetFilter(filter) => {
                self.filter = filter;
                false
            }
            Action::SetSearch(term) => {
                self.search = term;
                false
            }
        }
    }

    fn submit(&mut self) -> bool {
        if self.form.text.trim().is_empty() {
            return false;
        }

        let text = self.form.text.clone();
        let due = self.form.due_date.trim();
        let due_date = (!due.is_empty()).then(|| due.to_string());
        let priority = Some(self.form.priority);

        let changed = match self.edit_target {
            Some(id) => match self.tasks.iter_mut().find(|t| t.id == id) {
                Some(task) => {
                    task.text = text;
                    task.due_date = due_date;
                    task.priority = priority;
                    true
                }
                None => {
                    log::warn!("edit target {} no longer exists; dropping edit", id);
                    false
                }
            },
            None => {
                self.tasks.push(Task::new(text, due_date, priority));
                true
            }
        };

        self.reset_form();
        changed
    }

    fn reset_form(&mut self) {
        self.edit_target = None;
        self.form = InputForm {
            priority: self.default_priority,
            ..InputForm::default()
        };
    }
}
