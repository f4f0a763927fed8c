use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Assembler directives. The set is closed; each variant is its own handler
/// key in the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, Display)]
#[strum(ascii_case_insensitive)]
pub enum Directive {
    #[strum(serialize = ".data")]
    Data,
    #[strum(serialize = ".text")]
    Text,
    #[strum(serialize = ".word")]
    Word,
    #[strum(serialize = ".ascii")]
    Ascii,
    #[strum(serialize = ".asciiz")]
    Asciiz,
    #[strum(serialize = ".byte")]
    Byte,
    #[strum(serialize = ".align")]
    Align,
    #[strum(serialize = ".half")]
    Half,
    #[strum(serialize = ".space")]
    Space,
    #[strum(serialize = ".double")]
    Double,
    #[strum(serialize = ".float")]
    Float,
    #[strum(serialize = ".extern")]
    Extern,
    #[strum(serialize = ".kdata")]
    Kdata,
    #[strum(serialize = ".ktext")]
    Ktext,
    #[strum(serialize = ".globl")]
    Globl,
    #[strum(serialize = ".set")]
    Set,
    #[strum(serialize = ".eqv")]
    Eqv,
    #[strum(serialize = ".macro")]
    Macro,
    #[strum(serialize = ".end_macro")]
    EndMacro,
    #[strum(serialize = ".include")]
    Include,
}

impl Directive {
    pub fn description(self) -> &'static str {
        match self {
            Directive::Data => "Subsequent items stored in Data segment at next available address",
            Directive::Text => "Subsequent items (instructions) stored in Text segment at next available address",
            Directive::Word => "Store the listed value(s) as 32 bit words on word boundary",
            Directive::Ascii => "Store the string in the Data segment but do not add null terminator",
            Directive::Asciiz => "Store the string in the Data segment and add null terminator",
            Directive::Byte => "Store the listed value(s) as 8 bit bytes",
            Directive::Align => "Align next data item on specified byte boundary (0=byte, 1=half, 2=word, 3=double)",
            Directive::Half => "Store the listed value(s) as 16 bit halfwords on halfword boundary",
            Directive::Space => "Reserve the next specified number of bytes in Data segment",
            Directive::Double => "Store the listed value(s) as double precision floating point",
            Directive::Float => "Store the listed value(s) as single precision floating point",
            Directive::Extern => "Declare the listed label and byte length to be a global data field",
            Directive::Kdata => "Subsequent items stored in Kernel Data segment at next available address",
            Directive::Ktext => "Subsequent items (instructions) stored in Kernel Text segment at next available address",
            Directive::Globl => "Declare the listed label(s) as global to enable referencing from other files",
            Directive::Set => "Set assembler variables. Currently ignored",
            Directive::Eqv => "Substitute second operand for first. First operand is symbol, second operand is expression",
            Directive::Macro => "Begin macro definition. See .end_macro",
            Directive::EndMacro => "End macro definition. See .macro",
            Directive::Include => "Insert the contents of the specified file. Put filename in quotes.",
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Directive::Word | Directive::Half | Directive::Byte)
    }

    pub fn is_real(self) -> bool {
        matches!(self, Directive::Float | Directive::Double)
    }

    /// Directives that may continue onto following lines without repeating
    /// the directive name.
    pub fn is_data(self) -> bool {
        self.is_integer() || self.is_real()
    }

    /// Size in bytes of one stored element.
    pub fn data_size(self) -> Option<u32> {
        match self {
            Directive::Byte => Some(1),
            Directive::Half => Some(2),
            Directive::Word | Directive::Float => Some(4),
            Directive::Double => Some(8),
            _ => None,
        }
    }

    /// Directives whose name starts with `prefix`, for editor completion.
    pub fn prefix_matches(prefix: &str) -> Vec<Directive> {
        let prefix = prefix.to_lowercase();
        Directive::iter()
            .filter(|d| d.to_string().starts_with(&prefix))
            .collect()
    }
}

#[test]
fn test() {
    assert_eq!(".word".parse::<Directive>().ok(), Some(Directive::Word));
    assert_eq!(".end_macro".parse::<Directive>().ok(), Some(Directive::EndMacro));
    assert_eq!(".TEXT".parse::<Directive>().ok(), Some(Directive::Text));
    assert!(".wrd".parse::<Directive>().is_err());
    assert_eq!(Directive::Asciiz.to_string(), ".asciiz");
    assert_eq!(Directive::Double.data_size(), Some(8));
    assert!(Directive::prefix_matches(".as").contains(&Directive::Ascii));
}
