pub mod assembler;
pub mod bytefile;
pub mod settings;

// Prints every token produced for a compile unit when the
// show_tokens feature is enabled. Does nothing otherwise.
#[macro_export]
macro_rules! token_log {
    ($tokens:expr) => {
        #[cfg(feature = "show_tokens")]
        for token in $tokens {
            println!("{:?}", token);
        }
    };
}
