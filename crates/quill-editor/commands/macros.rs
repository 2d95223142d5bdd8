//! Macros for ergonomic command calls

/// Build [`CommandArgs`](crate::CommandArgs) from a list of values
///
/// Every element is converted with `CommandArg::from`, so strings, numbers,
/// booleans, JSON values, shared transactions, raw commands and delayed
/// values can be mixed.
///
/// # Examples
///
/// ```
/// use quill_editor::command_args;
///
/// let args = command_args!["Hello", 3usize];
/// assert_eq!(args.str(0), Some("Hello"));
/// assert_eq!(args.usize(1), Some(3));
/// assert!(command_args![].is_empty());
/// ```
#[macro_export]
macro_rules! command_args {
    () => {
        $crate::CommandArgs::new()
    };

    ($($arg:expr),+ $(,)?) => {
        $crate::CommandArgs::from(::std::vec![$($crate::CommandArg::from($arg)),+])
    };
}

/// Call a chain of commands and dispatch once
///
/// `chain!(manager, insertText("a"), insertText("b"))` expands to
/// `manager.chain()?.call("insertText", ...)?...run()`, so it must be used
/// in a function returning the crate `Result`.
///
/// # Examples
///
/// ```
/// use quill_editor::{chain, Framework, FrameworkProps, Manager, ManagerSettings};
///
/// # fn main() -> quill_editor::Result<()> {
/// let manager = Manager::create(Vec::new(), ManagerSettings::default())?;
/// let framework = Framework::headless(manager.clone(), FrameworkProps::default())?;
///
/// chain!(manager, insertText("foo"), insertText("bar"))?;
/// assert_eq!(framework.get_state()?.doc().text(), "foobar");
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! chain {
    ($manager:expr, $($name:ident ( $($arg:expr),* $(,)? )),+ $(,)?) => {{
        let chain = $manager.chain()?;
        $(
            chain.call(stringify!($name), $crate::command_args![$($arg),*])?;
        )+
        chain.run()
    }};
}
