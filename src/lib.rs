pub mod error;
pub mod first_follow;
pub mod grammar;
pub mod item;
pub mod lexeme;
pub mod ll1;
pub mod slr;
pub mod table;
pub mod token;

pub use error::{Error, SyntaxError};
pub use first_follow::{FirstSets, FollowSets};
pub use grammar::{Grammar, Production};
pub use item::{Family, Item, ItemSet};
pub use lexeme::{Lexeme, Position, split_categories};
pub use ll1::{Ll1Parser, Ll1Table};
pub use slr::SlrParser;
pub use table::{ActionCell, Table};
pub use token::{EOF, EPSILON, NonTerminal, Terminal, Token};
