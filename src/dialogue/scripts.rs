//! Built-in dialogue scripts.

use super::script::StepScript;
use super::state::Answers;
use super::step::{Choice, Choices, Prompt, Step, interpolate};
use super::validate::Validator;
use crate::error::ScriptError;

/// Step ids of the lead-intake script.
pub mod ids {
    pub const WELCOME: &str = "welcome";
    pub const ASK_NAME: &str = "ask_name";
    pub const ASK_USER_TYPE: &str = "ask_user_type";
    pub const ASK_BUSINESS_NAME: &str = "ask_business_name";
    pub const ASK_BUSINESS_SEGMENT: &str = "ask_business_segment";
    pub const ASK_BUDGET: &str = "ask_budget";
    pub const ASK_CREATOR_INFO: &str = "ask_creator_info";
    pub const ASK_CREATOR_PLATFORM: &str = "ask_creator_platform";
    pub const ASK_FOLLOWERS: &str = "ask_followers";
    pub const ASK_WHATSAPP: &str = "ask_whatsapp";
    pub const ASK_EMAIL: &str = "ask_email";
    pub const ASK_GOAL: &str = "ask_goal";
    pub const CLOSING: &str = "closing";
}

/// Answer keys written by the lead-intake script.
pub mod fields {
    pub const NAME: &str = "name";
    pub const USER_TYPE: &str = "userType";
    pub const BUSINESS_NAME: &str = "businessName";
    pub const BUSINESS_SEGMENT: &str = "businessSegment";
    pub const BUDGET: &str = "budget";
    pub const CREATOR_INFO: &str = "creatorInfo";
    pub const CREATOR_PLATFORM: &str = "creatorPlatform";
    pub const FOLLOWERS: &str = "followers";
    pub const WHATSAPP: &str = "whatsapp";
    pub const EMAIL: &str = "email";
    pub const GOAL: &str = "goal";
}

pub const USER_TYPE_BUSINESS: &str = "empresa";
pub const USER_TYPE_CREATOR: &str = "criador";

/// The website lead-intake dialogue.
///
/// Businesses and creators answer disjoint question runs after the
/// user-type step and converge on the contact questions.
pub fn lead_intake_script() -> Result<StepScript, ScriptError> {
    use fields::*;
    use ids::*;

    StepScript::new(
        "lead_intake",
        vec![
            Step::message(
                WELCOME,
                "Olá! 👋 Eu sou a assistente virtual da Cria. Vou te fazer algumas perguntas rápidas para entender como podemos ajudar.",
            )
            .then(ASK_NAME),
            Step::text(
                ASK_NAME,
                "Para começar, qual é o seu nome?",
                NAME,
                Validator::MinLength(2),
                "Por favor, digite seu nome (pelo menos 2 caracteres).",
            )
            .placeholder("Seu nome")
            .then(ASK_USER_TYPE),
            Step::choice(
                ASK_USER_TYPE,
                Prompt::Computed(|a| interpolate("Prazer, {name}! 😊 Você é:", a)),
                USER_TYPE,
                Choices::Static(vec![
                    Choice::new("🏢 Empresa/Negócio", USER_TYPE_BUSINESS),
                    Choice::new("🎨 Criador(a) de Conteúdo", USER_TYPE_CREATOR),
                ]),
            )
            .branch(route_by_user_type),
            // ── Business branch ──
            Step::text(
                ASK_BUSINESS_NAME,
                "Qual é o nome da sua empresa ou negócio?",
                BUSINESS_NAME,
                Validator::MinLength(2),
                "Por favor, digite o nome da empresa (pelo menos 2 caracteres).",
            )
            .placeholder("Nome da empresa")
            .then(ASK_BUSINESS_SEGMENT),
            Step::choice(
                ASK_BUSINESS_SEGMENT,
                Prompt::Computed(|a| interpolate("Em qual segmento a {businessName} atua?", a)),
                BUSINESS_SEGMENT,
                Choices::Static(vec![
                    Choice::new("🛍️ Varejo/E-commerce", "varejo"),
                    Choice::new("🍔 Alimentação", "alimentacao"),
                    Choice::new("💄 Beleza e Moda", "beleza_moda"),
                    Choice::new("💻 Tecnologia", "tecnologia"),
                    Choice::new("📦 Outro", "outro"),
                ]),
            )
            .then(ASK_BUDGET),
            Step::choice(
                ASK_BUDGET,
                "Qual é o investimento mensal previsto em marketing de influência?",
                BUDGET,
                Choices::Static(vec![
                    Choice::new("Até R$ 2.000", "ate_2k"),
                    Choice::new("R$ 2.000 a R$ 10.000", "2k_10k"),
                    Choice::new("Acima de R$ 10.000", "acima_10k"),
                    Choice::new("Ainda não sei", "indefinido"),
                ]),
            )
            .then(ASK_WHATSAPP),
            // ── Creator branch ──
            Step::text(
                ASK_CREATOR_INFO,
                "Qual é o seu @ principal e o seu nicho de conteúdo?",
                CREATOR_INFO,
                Validator::MinLength(2),
                "Conta um pouquinho mais: informe seu @ ou nicho (pelo menos 2 caracteres).",
            )
            .placeholder("@seuperfil - nicho")
            .then(ASK_CREATOR_PLATFORM),
            Step::choice(
                ASK_CREATOR_PLATFORM,
                "Em qual plataforma você tem mais seguidores?",
                CREATOR_PLATFORM,
                Choices::Static(vec![
                    Choice::new("📸 Instagram", "instagram"),
                    Choice::new("🎵 TikTok", "tiktok"),
                    Choice::new("▶️ YouTube", "youtube"),
                    Choice::new("Outra", "outra"),
                ]),
            )
            .then(ASK_FOLLOWERS),
            Step::choice(
                ASK_FOLLOWERS,
                "Quantos seguidores você tem nessa plataforma?",
                FOLLOWERS,
                Choices::Static(vec![
                    Choice::new("Até 10 mil", "ate_10k"),
                    Choice::new("10 mil a 100 mil", "10k_100k"),
                    Choice::new("100 mil a 1 milhão", "100k_1m"),
                    Choice::new("Mais de 1 milhão", "acima_1m"),
                ]),
            )
            .then(ASK_WHATSAPP),
            // ── Contact ──
            Step::text(
                ASK_WHATSAPP,
                Prompt::Computed(|a| {
                    interpolate("Ótimo, {name}! Qual é o seu WhatsApp com DDD?", a)
                }),
                WHATSAPP,
                Validator::whatsapp(),
                "Por favor, digite um WhatsApp válido, apenas números com DDD. Ex: 11987654321",
            )
            .placeholder("(11) 98765-4321")
            .then(ASK_EMAIL),
            Step::text(
                ASK_EMAIL,
                "E qual é o seu melhor e-mail?",
                EMAIL,
                Validator::Email,
                "Hmm, esse e-mail não parece válido. Pode conferir?",
            )
            .placeholder("voce@exemplo.com")
            .then(ASK_GOAL),
            Step::choice(
                ASK_GOAL,
                "Por último: qual é o seu principal objetivo com a Cria?",
                GOAL,
                Choices::Computed(goal_choices),
            )
            .then(CLOSING),
            Step::message(CLOSING, Prompt::Computed(closing_message)).terminal(),
        ],
    )
}

fn route_by_user_type(value: &str, _answers: &Answers) -> String {
    if value == USER_TYPE_BUSINESS {
        ids::ASK_BUSINESS_NAME.to_string()
    } else {
        ids::ASK_CREATOR_INFO.to_string()
    }
}

fn goal_choices(answers: &Answers) -> Vec<Choice> {
    if answers.get(fields::USER_TYPE) == Some(USER_TYPE_BUSINESS) {
        vec![
            Choice::new("📣 Divulgar minha marca", "divulgar_marca"),
            Choice::new("📈 Aumentar vendas", "aumentar_vendas"),
            Choice::new("🤝 Encontrar criadores", "encontrar_criadores"),
        ]
    } else {
        vec![
            Choice::new("💰 Fechar parcerias pagas", "parcerias"),
            Choice::new("🚀 Crescer meu perfil", "crescer_perfil"),
            Choice::new("🎓 Aprender sobre o mercado", "aprender"),
        ]
    }
}

fn closing_message(answers: &Answers) -> String {
    interpolate(
        "Perfeito, {name}! 🎉 Recebemos suas informações. Nossa equipe vai entrar em contato pelo WhatsApp {whatsapp} em breve. Obrigado!",
        answers,
    )
}
