//! Clinic profile
//!
//! Everything the assistant says that is specific to one clinic lives here:
//! the menu, the knowledge text the model answers from, and the canned
//! replies. Defaults are deliberately generic; a real deployment sets them in
//! the `[clinic]` section of `dental-gateway.toml`.

use serde::{Deserialize, Serialize};

/// What choosing a menu option does
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MenuAction {
    /// Send a fixed text
    Reply { text: String },
    /// Ask the model this question, answered from the clinic knowledge
    Ask { question: String },
    /// Explain how to book (or start booking when a calendar is configured)
    Booking,
    /// Tell the user a person will take over
    Handoff { text: String },
}

/// One entry of the main menu
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MenuOption {
    /// What the user types, e.g. `"1"`
    pub key: String,
    pub label: String,
    #[serde(flatten)]
    pub action: MenuAction,
}

impl MenuOption {
    pub fn new(key: &str, label: &str, action: MenuAction) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            action,
        }
    }
}

/// Clinic-specific texts and menu
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicProfile {
    pub name: String,
    /// Reference text the model must answer from (treatments, prices, hours...)
    pub knowledge: String,
    /// Messages that bring up the main menu
    pub greetings: Vec<String>,
    pub menu_intro: String,
    pub menu: Vec<MenuOption>,
    /// Sent for booking requests when no calendar is configured
    pub booking_instructions: String,
    /// Sent when a free-text question arrives and no model is configured
    pub fallback_reply: String,
    /// Sent when answering failed
    pub error_reply: String,
    /// System prompt template; `{clinic}` and `{knowledge}` are substituted
    pub system_prompt: String,
}

impl Default for ClinicProfile {
    fn default() -> Self {
        let ask = |question: &str| MenuAction::Ask {
            question: question.to_string(),
        };

        Self {
            name: "Clínica Dental".to_string(),
            knowledge: String::new(),
            greetings: ["hola", "menu", "menú", "inicio", "start", "hi", "hello"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            menu_intro: "Soy tu asistente virtual. Elige una opción:".to_string(),
            menu: vec![
                MenuOption::new("1", "Tratamientos", ask("¿Qué tratamientos ofrecéis?")),
                MenuOption::new("2", "Precios", ask("¿Cuáles son los precios de los tratamientos?")),
                MenuOption::new("3", "Horario", ask("¿Cuál es el horario de la clínica?")),
                MenuOption::new("4", "Ubicación", ask("¿Dónde está la clínica?")),
                MenuOption::new("5", "Pedir cita", MenuAction::Booking),
                MenuOption::new("6", "Preguntas frecuentes", ask("Resume las preguntas frecuentes.")),
                MenuOption::new(
                    "0",
                    "Hablar con un humano",
                    MenuAction::Handoff {
                        text: "📞 Derivando a un humano…".to_string(),
                    },
                ),
            ],
            booking_instructions:
                "Para pedir cita envía tu nombre + día deseado. Un humano te confirmará.".to_string(),
            fallback_reply:
                "Ahora mismo no puedo responder a esa pregunta. Escribe *menu* para ver las opciones."
                    .to_string(),
            error_reply: "Lo siento, ha ocurrido un error. Inténtalo de nuevo en unos minutos."
                .to_string(),
            system_prompt: "Eres el asistente virtual de {clinic}.\n\
                Responde SOLO con la siguiente información:\n\n\
                {knowledge}\n\n\
                Si el usuario pregunta por precios, horarios o tratamientos, respóndelo exactamente.\n\
                No inventes nada que no esté arriba. Responde en el idioma del usuario."
                .to_string(),
        }
    }
}

impl ClinicProfile {
    /// Whether `text` (already trimmed and lower-cased) asks for the menu
    pub fn is_greeting(&self, text: &str) -> bool {
        self.greetings.iter().any(|g| g.eq_ignore_ascii_case(text))
    }

    /// Menu option selected by `text` (already trimmed and lower-cased).
    ///
    /// Accepts the bare key (`"1"`, `"1."`, `"1)"`) or the option label.
    pub fn find_option(&self, text: &str) -> Option<&MenuOption> {
        let key = text.trim_end_matches(['.', ')']);
        self.menu
            .iter()
            .find(|opt| opt.key.eq_ignore_ascii_case(key) || opt.label.to_lowercase() == text)
    }

    /// Main menu text
    pub fn render_menu(&self) -> String {
        let mut menu = format!("👋 *{}*\n{}\n", self.name, self.menu_intro);
        for option in &self.menu {
            menu.push('\n');
            menu.push_str(&keycap(&option.key));
            menu.push(' ');
            menu.push_str(&option.label);
        }
        menu
    }

    /// System prompt for free-text questions
    pub fn render_system_prompt(&self) -> String {
        self.system_prompt
            .replace("{clinic}", &self.name)
            .replace("{knowledge}", self.knowledge.trim())
    }
}

/// `"1"` → `"1️⃣"`; anything that is not a single digit becomes `"key."`
fn keycap(key: &str) -> String {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_digit() => format!("{}\u{FE0F}\u{20E3}", c),
        _ => format!("{}.", key),
    }
}
