//! The ordered OCR correction rule table.
//!
//! Rules run top to bottom on every text line of a pass. Order matters:
//! whitespace normalisation comes first, so anything a later rule leaves
//! behind (a removed noise glyph, a merged tag) is only tidied up on the
//! next pass.

use once_cell::sync::Lazy;
use regex::Regex;

/// Bumped whenever rules are added, removed or reordered.
pub const RULE_TABLE_VERSION: u32 = 3;

/// How a rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Plain substring replacement.
    Literal,
    /// Regular expression; `replace` may use `${n}` group references.
    Pattern,
}

/// One find/replace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrectionRule {
    pub kind: RuleKind,
    pub find: &'static str,
    pub replace: &'static str,
    pub description: &'static str,
}

macro_rules! lit {
    ($find:expr, $replace:expr, $desc:expr) => {
        CorrectionRule {
            kind: RuleKind::Literal,
            find: $find,
            replace: $replace,
            description: $desc,
        }
    };
}

macro_rules! pat {
    ($find:expr, $replace:expr, $desc:expr) => {
        CorrectionRule {
            kind: RuleKind::Pattern,
            find: $find,
            replace: $replace,
            description: $desc,
        }
    };
}

/// Whole-word OCR misread.
macro_rules! word {
    ($find:literal, $replace:literal) => {
        CorrectionRule {
            kind: RuleKind::Pattern,
            find: concat!(r"\b", $find, r"\b"),
            replace: $replace,
            description: concat!("misread word: ", $find),
        }
    };
}

/// The rule table, in application order.
pub static RULES: &[CorrectionRule] = &[
    // Whitespace
    pat!(r"[ \t]{2,}", " ", "collapse repeated spaces"),
    pat!(r"^[ \t]+", "", "strip leading whitespace"),
    pat!(r"[ \t]+$", "", "strip trailing whitespace"),
    lit!("\t", " ", "tab to space"),
    // Invisible characters and OCR noise glyphs
    lit!("\u{200B}", "", "zero-width space"),
    lit!("\u{200C}", "", "zero-width non-joiner"),
    lit!("\u{00AD}", "", "soft hyphen"),
    lit!("\u{FFFD}", "", "replacement character"),
    lit!("¦", "", "broken bar noise"),
    lit!("¬", "", "not-sign noise"),
    lit!("§", "", "section-sign noise"),
    lit!("¤", "", "currency-sign noise"),
    // Typographic ligatures
    lit!("ﬁ", "fi", "fi ligature"),
    lit!("ﬂ", "fl", "fl ligature"),
    lit!("ﬀ", "ff", "ff ligature"),
    lit!("ﬃ", "ffi", "ffi ligature"),
    lit!("ﬄ", "ffl", "ffl ligature"),
    lit!("ﬅ", "st", "long st ligature"),
    // Italic tags
    lit!("< i>", "<i>", "space inside opening tag"),
    lit!("<i >", "<i>", "space inside opening tag"),
    lit!("</ i>", "</i>", "space inside closing tag"),
    lit!("< /i>", "</i>", "space inside closing tag"),
    lit!("</i >", "</i>", "space inside closing tag"),
    lit!("<I>", "<i>", "uppercase italic tag"),
    lit!("</I>", "</i>", "uppercase italic tag"),
    lit!("<l>", "<i>", "italic tag read as l"),
    lit!("</l>", "</i>", "italic tag read as l"),
    lit!("<i></i>", "", "empty italic span"),
    lit!("</i><i>", "", "adjacent italic spans"),
    lit!("</i> <i>", " ", "adjacent italic spans"),
    pat!(r"<i>[ \t]+", "<i>", "space after opening tag"),
    pat!(r"[ \t]+</i>", "</i>", "space before closing tag"),
    // Vertical bar and lowercase l read for capital I
    pat!(r"(^|\s)\|(\s|$)", "${1}I${2}", "bar as pronoun I"),
    pat!(r"\|(['’](?:m|ll|ve|d)\b)", "I${1}", "bar in I contraction"),
    pat!(r#"(^|[\s"(\[-])\|([a-z])"#, "${1}I${2}", "bar as leading I"),
    pat!(r"\bl(['’](?:m|ll|ve|d))\b", "I${1}", "l in I contraction"),
    pat!(r"\b1(['’](?:m|ll|ve|d))\b", "I${1}", "1 in I contraction"),
    pat!(r"(^|\s)l(\s|$)", "${1}I${2}", "l as pronoun I"),
    word!("lt", "It"),
    word!("lts", "Its"),
    word!("lt's", "It's"),
    word!("lsn't", "Isn't"),
    word!("ln", "In"),
    word!("lf", "If"),
    word!("ls", "Is"),
    word!("lnto", "Into"),
    word!("lnside", "Inside"),
    // li read for h
    word!("tlie", "the"),
    word!("Tlie", "The"),
    word!("tliat", "that"),
    word!("Tliat", "That"),
    word!("tliis", "this"),
    word!("Tliis", "This"),
    word!("tliey", "they"),
    word!("Tliey", "They"),
    word!("tliere", "there"),
    word!("Tliere", "There"),
    word!("tlien", "then"),
    word!("Tlien", "Then"),
    word!("tliem", "them"),
    word!("tliink", "think"),
    word!("Tliink", "Think"),
    word!("tliing", "thing"),
    word!("tliings", "things"),
    word!("tlirough", "through"),
    word!("tliought", "thought"),
    word!("tliank", "thank"),
    word!("Tliank", "Thank"),
    word!("tlianks", "thanks"),
    word!("Tlianks", "Thanks"),
    word!("tliose", "those"),
    word!("tliese", "these"),
    word!("tliree", "three"),
    word!("wliat", "what"),
    word!("Wliat", "What"),
    word!("wlien", "when"),
    word!("Wlien", "When"),
    word!("wliere", "where"),
    word!("Wliere", "Where"),
    word!("wlio", "who"),
    word!("Wlio", "Who"),
    word!("wliy", "why"),
    word!("Wliy", "Why"),
    word!("wliich", "which"),
    word!("wliile", "while"),
    word!("wliole", "whole"),
    word!("liave", "have"),
    word!("Liave", "Have"),
    word!("liere", "here"),
    word!("Liere", "Here"),
    word!("liow", "how"),
    word!("Liow", "How"),
    word!("liim", "him"),
    word!("liis", "his"),
    word!("liome", "home"),
    word!("liouse", "house"),
    word!("liead", "head"),
    word!("lieard", "heard"),
    word!("liear", "hear"),
    word!("lielp", "help"),
    word!("Lielp", "Help"),
    word!("liell", "hell"),
    word!("liello", "hello"),
    word!("Liello", "Hello"),
    word!("liey", "hey"),
    word!("Liey", "Hey"),
    word!("liurt", "hurt"),
    word!("liappy", "happy"),
    word!("liappen", "happen"),
    word!("liappened", "happened"),
    word!("liand", "hand"),
    word!("liands", "hands"),
    word!("liad", "had"),
    word!("lias", "has"),
    word!("liasn't", "hasn't"),
    word!("liaven't", "haven't"),
    word!("sliould", "should"),
    word!("slie", "she"),
    word!("Slie", "She"),
    word!("notliing", "nothing"),
    word!("Notliing", "Nothing"),
    word!("sometliing", "something"),
    word!("anytliing", "anything"),
    word!("everytliing", "everything"),
    word!("witli", "with"),
    word!("Witli", "With"),
    word!("otlier", "other"),
    word!("anotlier", "another"),
    word!("motlier", "mother"),
    word!("fatlier", "father"),
    word!("brotlier", "brother"),
    word!("riglit", "right"),
    word!("Riglit", "Right"),
    word!("niglit", "night"),
    word!("toniglit", "tonight"),
    word!("liglit", "light"),
    word!("miglit", "might"),
    word!("briglit", "bright"),
    word!("eacli", "each"),
    word!("mucli", "much"),
    word!("sucli", "such"),
    word!("cliild", "child"),
    word!("cliance", "chance"),
    word!("cliange", "change"),
    word!("cliurch", "church"),
    word!("teacli", "teach"),
    word!("reacli", "reach"),
    word!("watcli", "watch"),
    word!("catcli", "catch"),
    word!("matcli", "match"),
    // Capital I read for l
    word!("aII", "all"),
    word!("AII", "All"),
    word!("caII", "call"),
    word!("faII", "fall"),
    word!("waII", "wall"),
    word!("taII", "tall"),
    word!("baII", "ball"),
    word!("smaII", "small"),
    word!("wiII", "will"),
    word!("WiII", "Will"),
    word!("stiII", "still"),
    word!("kiII", "kill"),
    word!("tiII", "till"),
    word!("fiII", "fill"),
    word!("biII", "bill"),
    word!("teII", "tell"),
    word!("TeII", "Tell"),
    word!("weII", "well"),
    word!("WeII", "Well"),
    word!("seII", "sell"),
    word!("heII", "hell"),
    word!("HeII", "Hell"),
    word!("feII", "fell"),
    word!("beII", "bell"),
    word!("reaIIy", "really"),
    word!("ReaIIy", "Really"),
    word!("actuaIIy", "actually"),
    word!("finaIIy", "finally"),
    word!("totaIIy", "totally"),
    word!("usuaIIy", "usually"),
    word!("IittIe", "little"),
    word!("LittIe", "Little"),
    word!("Iittle", "little"),
    word!("Iike", "like"),
    word!("Iook", "look"),
    word!("Iooks", "looks"),
    word!("Iooking", "looking"),
    word!("Iove", "love"),
    word!("Iet", "let"),
    word!("Iet's", "let's"),
    word!("Iife", "life"),
    word!("Ieave", "leave"),
    word!("Iong", "long"),
    word!("Iater", "later"),
    word!("Iast", "last"),
    word!("Iost", "lost"),
    word!("Iot", "lot"),
    word!("Iisten", "listen"),
    word!("Iady", "lady"),
    word!("Iine", "line"),
    word!("Iucky", "lucky"),
    word!("Iuck", "luck"),
    word!("peopIe", "people"),
    word!("heIp", "help"),
    word!("HeIp", "Help"),
    word!("heIIo", "hello"),
    word!("HeIIo", "Hello"),
    word!("pIease", "please"),
    word!("PIease", "Please"),
    word!("pIace", "place"),
    word!("onIy", "only"),
    word!("OnIy", "Only"),
    word!("feeI", "feel"),
    word!("reaI", "real"),
    word!("couId", "could"),
    word!("CouId", "Could"),
    word!("wouId", "would"),
    word!("WouId", "Would"),
    word!("shouId", "should"),
    word!("ShouId", "Should"),
    word!("couIdn't", "couldn't"),
    word!("wouIdn't", "wouldn't"),
    word!("shouIdn't", "shouldn't"),
    word!("taIk", "talk"),
    word!("waIk", "walk"),
    word!("oId", "old"),
    word!("toId", "told"),
    word!("coId", "cold"),
    word!("hoId", "hold"),
    word!("HoId", "Hold"),
    word!("goId", "gold"),
    word!("worId", "world"),
    word!("beIieve", "believe"),
    word!("aIone", "alone"),
    word!("aIready", "already"),
    word!("aIways", "always"),
    word!("AIways", "Always"),
    word!("aIso", "also"),
    word!("aIright", "alright"),
    word!("AIright", "Alright"),
    word!("aImost", "almost"),
    word!("sIeep", "sleep"),
    word!("bIood", "blood"),
    word!("cIose", "close"),
    word!("cIear", "clear"),
    word!("fIoor", "floor"),
    word!("pIan", "plan"),
    word!("pIay", "play"),
    word!("gIad", "glad"),
    word!("feIt", "felt"),
    word!("seIf", "self"),
    word!("myseIf", "myself"),
    word!("yourseIf", "yourself"),
    word!("himseIf", "himself"),
    word!("herseIf", "herself"),
    pat!(r"\b([a-z]+)II([a-z]*)\b", "${1}ll${2}", "II inside lowercase word"),
    pat!(r"\b([a-z]+)I([a-z]*)\b", "${1}l${2}", "I inside lowercase word"),
    // rn read for m
    word!("rnore", "more"),
    word!("rnost", "most"),
    word!("sornething", "something"),
    word!("Sornething", "Something"),
    word!("sorneone", "someone"),
    word!("Sorneone", "Someone"),
    word!("sornetimes", "sometimes"),
    word!("sornewhere", "somewhere"),
    word!("tirne", "time"),
    word!("tirnes", "times"),
    word!("corne", "come"),
    word!("Corne", "Come"),
    word!("becorne", "become"),
    word!("welcorne", "welcome"),
    word!("Welcorne", "Welcome"),
    word!("horne", "home"),
    word!("narne", "name"),
    word!("sarne", "same"),
    word!("rnaybe", "maybe"),
    word!("rny", "my"),
    word!("rnyself", "myself"),
    word!("frorn", "from"),
    word!("rne", "me"),
    word!("rnust", "must"),
    word!("rnean", "mean"),
    word!("rnoney", "money"),
    word!("rnother", "mother"),
    word!("rnorning", "morning"),
    word!("rnake", "make"),
    word!("rnade", "made"),
    word!("rnan", "man"),
    word!("rnen", "men"),
    word!("rninute", "minute"),
    word!("rninutes", "minutes"),
    word!("rnind", "mind"),
    word!("thern", "them"),
    word!("whorn", "whom"),
    word!("problern", "problem"),
    word!("rnuch", "much"),
    word!("rnatter", "matter"),
    word!("rnove", "move"),
    word!("rneet", "meet"),
    word!("rniss", "miss"),
    word!("rnissed", "missed"),
    word!("rnight", "might"),
    word!("rnoment", "moment"),
    word!("rnurder", "murder"),
    word!("rnarried", "married"),
    word!("rnusic", "music"),
    word!("rnonth", "month"),
    word!("hirn", "him"),
    word!("arn", "am"),
    word!("tearn", "team"),
    word!("drearn", "dream"),
    word!("forrn", "form"),
    // vv read for w
    word!("vvhat", "what"),
    word!("Vvhat", "What"),
    word!("vvhy", "why"),
    word!("Vvhy", "Why"),
    word!("vvho", "who"),
    word!("vvhen", "when"),
    word!("vvhere", "where"),
    word!("vvell", "well"),
    word!("Vvell", "Well"),
    word!("vvant", "want"),
    word!("vvas", "was"),
    word!("vvith", "with"),
    word!("vvill", "will"),
    word!("vvay", "way"),
    word!("vve", "we"),
    word!("Vve", "We"),
    word!("vvork", "work"),
    word!("vvait", "wait"),
    word!("Vvait", "Wait"),
    word!("vvould", "would"),
    word!("vvere", "were"),
    word!("vvon't", "won't"),
    word!("vvorld", "world"),
    word!("vvoman", "woman"),
    word!("vvife", "wife"),
    word!("novv", "now"),
    word!("Novv", "Now"),
    word!("knovv", "know"),
    word!("hovv", "how"),
    word!("Hovv", "How"),
    word!("shovv", "show"),
    // cl read for d
    word!("clon't", "don't"),
    word!("Clon't", "Don't"),
    word!("cloesn't", "doesn't"),
    word!("clid", "did"),
    word!("Clid", "Did"),
    word!("clidn't", "didn't"),
    word!("clo", "do"),
    word!("goocl", "good"),
    word!("neecl", "need"),
    word!("ancl", "and"),
    word!("Ancl", "And"),
    word!("cleacl", "dead"),
    word!("cleath", "death"),
    word!("olcl", "old"),
    word!("toclay", "today"),
    word!("Toclay", "Today"),
    // Zero read for O
    word!("0h", "Oh"),
    word!("0K", "OK"),
    word!("0kay", "Okay"),
    word!("0ne", "One"),
    word!("0nly", "Only"),
    word!("0ver", "Over"),
    word!("0ut", "Out"),
    word!("g0", "go"),
    word!("n0", "no"),
    word!("s0", "so"),
    word!("t0", "to"),
    word!("d0", "do"),
    word!("y0u", "you"),
    word!("Y0u", "You"),
    word!("y0ur", "your"),
    pat!(r"\b([a-z]+)0([a-z]+)\b", "${1}o${2}", "zero inside lowercase word"),
    // Letters inside numbers
    pat!(r"(\d)[oO](\d)", "${1}0${2}", "O inside number"),
    pat!(r"(\d)[lI](\d)", "${1}1${2}", "l inside number"),
    pat!(r"\b[lI](\d):(\d{2})\b", "1${1}:${2}", "l leading a clock time"),
    // Contractions split by a stray space
    pat!(r"(\w) '(s|t|re|ve|ll|d|m)\b", "${1}'${2}", "space before apostrophe"),
    pat!(r"(\w)' (s|t|re|ve|ll|d|m)\b", "${1}'${2}", "space after apostrophe"),
    pat!(r"\bn 't\b", "n't", "split n't"),
    // Quotes
    lit!("''", "\"", "two apostrophes as double quote"),
    lit!("``", "\"", "backticks as double quote"),
    lit!("„", "\"", "low double quote"),
    lit!("`", "'", "backtick as apostrophe"),
    // Punctuation
    lit!(". . .", "...", "spaced ellipsis"),
    pat!(r",{2,}", ",", "repeated comma"),
    lit!(",.", ".", "comma before period"),
    pat!(r"([!?])\.(\s|$)", "${1}${2}", "period after ! or ?"),
    pat!(r"(\w) +([,.?!;:])", "${1}${2}", "space before punctuation"),
    pat!(r"([a-z]),([A-Za-z])", "${1}, ${2}", "missing space after comma"),
    pat!(r"([a-z]{2})([?!])([A-Z])", "${1}${2} ${3}", "missing space after ! or ?"),
    pat!(r"([a-z]{2})\.([A-Z][a-z])", "${1}. ${2}", "missing space after period"),
    // Brackets
    pat!(r"\([ \t]+", "(", "space after opening parenthesis"),
    pat!(r"[ \t]+\)", ")", "space before closing parenthesis"),
    pat!(r"\[[ \t]+", "[", "space after opening bracket"),
    pat!(r"[ \t]+\]", "]", "space before closing bracket"),
];

/// A rule ready to run.
pub(crate) struct CompiledRule {
    pub rule: &'static CorrectionRule,
    matcher: Matcher,
}

enum Matcher {
    Literal,
    Pattern(Regex),
}

impl CompiledRule {
    /// Apply to one line; `None` when nothing matched.
    pub fn apply(&self, line: &str) -> Option<String> {
        match &self.matcher {
            Matcher::Literal => line
                .contains(self.rule.find)
                .then(|| line.replace(self.rule.find, self.rule.replace)),
            Matcher::Pattern(regex) => match regex.replace_all(line, self.rule.replace) {
                std::borrow::Cow::Owned(changed) if changed != line => Some(changed),
                _ => None,
            },
        }
    }
}

/// Compiled table, built on first use.
///
/// A pattern that fails to compile is logged and left out.
pub(crate) static COMPILED_RULES: Lazy<Vec<CompiledRule>> = Lazy::new(|| {
    RULES
        .iter()
        .filter_map(|rule| {
            let matcher = match rule.kind {
                RuleKind::Literal => Matcher::Literal,
                RuleKind::Pattern => match Regex::new(rule.find) {
                    Ok(regex) => Matcher::Pattern(regex),
                    Err(e) => {
                        tracing::error!("Skipping correction rule '{}': {}", rule.description, e);
                        return None;
                    }
                },
            };
            Some(CompiledRule { rule, matcher })
        })
        .collect()
});
