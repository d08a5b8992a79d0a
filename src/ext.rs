use crate::env::Environment;
use crate::error::Result;
use std::cell::RefCell;
use std::rc::Rc;

// An externally supplied bundle of primitives. Implementations register
// under a name with `Evaluator::register_extension`; a script then pulls the
// bundle in with `(load-ext "name")`, which calls `setup` once with the
// global environment. Setup is expected to install its procedures through
// the environment's bulk `extend`.
pub trait Extension {
    fn setup(&self, env: &Rc<RefCell<Environment>>) -> Result<()>;
}
