//! Topic tables: abbreviation expansions, retrieval keyword groups and
//! ingestion tag groups.
//!
//! The built-in tables cover the nutrition / supplements domain in Russian.
//! They are wrapped in an immutable [`Topics`] value that is injected into
//! the retrieval engine and the ingestion pipeline, so tests and
//! deployments can substitute their own tables.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

/// A named group of synonym phrases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordGroup {
    pub name: String,
    pub keywords: Vec<String>,
}

impl KeywordGroup {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// True if any keyword occurs as a substring of already lower-cased `text`
    pub fn matches(&self, text_lower: &str) -> bool {
        self.keywords.iter().any(|kw| text_lower.contains(kw.as_str()))
    }
}

/// Immutable topic configuration shared by retrieval and ingestion
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Topics {
    abbreviations: Vec<(String, String)>,
    keyword_groups: Vec<KeywordGroup>,
    tag_groups: Vec<KeywordGroup>,
}

impl Topics {
    pub fn new(
        abbreviations: Vec<(String, String)>,
        keyword_groups: Vec<KeywordGroup>,
        tag_groups: Vec<KeywordGroup>,
    ) -> Self {
        let abbreviations = abbreviations
            .into_iter()
            .map(|(short, full)| (short.trim().to_lowercase(), full))
            .filter(|(short, _)| !short.is_empty())
            .collect();
        let normalize = |groups: Vec<KeywordGroup>| {
            groups
                .into_iter()
                .map(|g| KeywordGroup {
                    name: g.name,
                    keywords: g
                        .keywords
                        .into_iter()
                        .map(|k| k.to_lowercase())
                        .filter(|k| !k.is_empty())
                        .collect(),
                })
                .collect()
        };

        Self {
            abbreviations,
            keyword_groups: normalize(keyword_groups),
            tag_groups: normalize(tag_groups),
        }
    }

    /// Tables with no entries: no expansion, no boosts, no tags
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn abbreviations(&self) -> &[(String, String)] {
        &self.abbreviations
    }

    pub fn keyword_groups(&self) -> &[KeywordGroup] {
        &self.keyword_groups
    }

    pub fn tag_groups(&self) -> &[KeywordGroup] {
        &self.tag_groups
    }
}

lazy_static! {
    /// Built-in nutrition-domain tables
    pub static ref DEFAULT_TOPICS: Topics = Topics::new(
        default_abbreviations(),
        default_keyword_groups(),
        default_tag_groups(),
    );
}

fn default_abbreviations() -> Vec<(String, String)> {
    [
        ("жкт", "желудочно-кишечный тракт"),
        ("цнс", "центральная нервная система"),
        ("имт", "индекс массы тела"),
        ("ср", "средство"),
        ("бад", "биологически активная добавка"),
        ("эм", "эфирное масло"),
        ("дотерра", "doTERRA БАД"),
        ("дотерр", "doTERRA БАД"),
        ("вит", "витамин"),
        ("мин", "минерал"),
        ("антиокс", "антиоксидант"),
    ]
    .iter()
    .map(|(s, f)| (s.to_string(), f.to_string()))
    .collect()
}

fn default_keyword_groups() -> Vec<KeywordGroup> {
    vec![
        KeywordGroup::new("heart", &[
            "сердце", "сосуды", "кровообращение", "давление", "холестерин", "гипертония", "артерии",
            "аритмия", "тахикардия", "брадикардия", "атеросклероз", "сердечная недостаточность",
            "кровяное давление", "венозная система", "капилляры", "сердечный ритм", "миокард",
        ]),
        KeywordGroup::new("sleep", &[
            "сон", "бессонница", "уснуть", "отдых", "расслабление", "спать", "ночной",
            "качество сна", "глубокий сон", "проблемы со сном", "сонливость", "циркадный ритм",
            "мелатонин", "нарушение сна", "дневная усталость", "пробуждение",
        ]),
        KeywordGroup::new("stress", &[
            "стресс", "тревога", "напряжение", "нервы", "успокоение", "паника", "эмоции",
            "нервозность", "переутомление", "выгорание", "эмоциональное напряжение", "релаксация",
            "психоэмоциональное состояние", "стрессоустойчивость", "кортизол", "адаптация",
        ]),
        KeywordGroup::new("energy", &[
            "энергия", "бодрость", "усталость", "активность", "жизненная сила", "тонус",
            "упадок сил", "энергичность", "вялость", "хроническая усталость", "выносливость",
            "митохондрии", "энергетический баланс", "жизненный тонус", "сила",
        ]),
        KeywordGroup::new("gut", &[
            "жкт", "пищеварение", "желудок", "кишечник", "микрофлора", "запор", "диарея",
            "гастрит", "дисбактериоз", "вздутие", "рефлюкс", "перистальтика", "энзимы",
            "микробиом", "синдром раздраженного кишечника", "ферменты", "кишечная проницаемость",
            "язва", "колит",
        ]),
        KeywordGroup::new("immunity", &[
            "иммунитет", "защита организма", "инфекции", "простуда", "вирусы", "иммунная система",
            "грипп", "орви", "иммунодефицит", "иммунный ответ", "вакцинация", "антитела",
            "лимфоциты", "воспалительные процессы", "интерфероны", "укрепление иммунитета",
        ]),
        KeywordGroup::new("joints", &[
            "суставы", "кости", "хрящи", "артрит", "боль в суставах", "гибкость", "остеопороз",
            "артроз", "ревматизм", "остеохондроз", "подагра", "хондропротекторы",
            "синовиальная жидкость", "суставная смазка", "коллаген", "минерализация костей",
            "переломы",
        ]),
        KeywordGroup::new("skin", &[
            "кожа", "дерма", "акне", "прыщи", "увлажнение кожи", "экзема", "псориаз",
            "дерматит", "сухость кожи", "морщины", "пигментация", "покраснение", "сыпь",
            "коллаген кожи", "эластичность кожи", "заживление ран", "кожный зуд", "шелушение",
        ]),
        KeywordGroup::new("hair", &[
            "волосы", "выпадение волос", "ломкость волос", "перхоть", "рост волос",
            "здоровье волос", "себорея", "алопеция", "секущиеся концы", "укрепление волос",
            "волосяные луковицы", "кожа головы", "жирность волос", "сухость волос", "блеск волос",
        ]),
        KeywordGroup::new("vision", &[
            "зрение", "глаза", "усталость глаз", "катаракта", "глаукома", "здоровье глаз",
            "дальнозоркость", "близорукость", "астигматизм", "сухость глаз", "сетчатка",
            "хрусталик", "глазное давление", "зрительная нагрузка", "цветовое восприятие",
        ]),
        KeywordGroup::new("hormones", &[
            "гормоны", "гормональный баланс", "щитовидка", "менопауза", "либидо",
            "эндокринная система", "тиреоидные гормоны", "эстроген", "прогестерон", "тестостерон",
            "инсулин", "гормон роста", "адреналин", "гормональный сбой", "надпочечники",
            "гипоталамус",
        ]),
        KeywordGroup::new("detox", &[
            "детоксикация", "очищение организма", "токсины", "печень", "почки", "чистка",
            "шлаки", "детокс-программы", "антиоксиданты", "выведение токсинов", "лимфодренаж",
            "очищение кишечника", "гепатопротекторы", "очищение крови", "почечная фильтрация",
        ]),
        KeywordGroup::new("weight", &[
            "вес", "похудение", "лишний вес", "ожирение", "метаболизм", "контроль веса",
            "жиросжигание", "масса тела", "диета", "калорийность", "аппетит", "набор веса",
            "индекс массы тела", "обмен веществ", "жировая ткань", "стройность",
        ]),
        KeywordGroup::new("muscles", &[
            "мышцы", "мышечная масса", "боль в мышцах", "восстановление мышц", "сила",
            "спазмы", "крепатура", "мышечный тонус", "рост мышц", "миофибриллы",
            "анаболизм", "белковый синтез", "мышечная выносливость", "растяжение мышц",
        ]),
        KeywordGroup::new("allergies", &[
            "аллергия", "аллергические реакции", "сыпь", "зуд", "астма", "ринит",
            "анафилаксия", "аллергены", "гистамин", "поллиноз", "пищевая аллергия",
            "контактный дерматит", "крапивница", "отек квинке", "аллергический кашель",
        ]),
        KeywordGroup::new("respiratory", &[
            "дыхание", "легкие", "бронхи", "кашель", "одышка", "дыхательная система",
            "бронхит", "пневмония", "туберкулез", "хрипы", "оксигенация", "дыхательная гимнастика",
            "мукоцилиарный клиренс", "легочная вентиляция", "эмфизема",
        ]),
        KeywordGroup::new("blood_sugar", &[
            "сахар в крови", "диабет", "глюкоза", "инсулин", "гликемия",
            "гипогликемия", "гипергликемия", "глюкометр", "гликемический индекс",
            "инсулинорезистентность", "диабет 2 типа", "углеводный обмен", "панкреас",
        ]),
        KeywordGroup::new("memory", &[
            "память", "концентрация", "мозг", "когнитивные функции", "фокус", "ясность ума",
            "нейропластичность", "запоминание", "внимание", "умственная работоспособность",
            "когнитивный спад", "деменция", "нейротрансмиттеры", "мозговая активность",
        ]),
        KeywordGroup::new("inflammation", &[
            "воспаление", "противовоспалительное", "отек", "хроническое воспаление",
            "цитокины", "воспалительные маркеры", "боль при воспалении", "покраснение",
            "воспалительный процесс", "иммунное воспаление", "острые воспаления",
        ]),
        KeywordGroup::new("circulation", &[
            "кровоток", "микроциркуляция", "варикоз", "тромбы", "капилляры",
            "венозный отток", "кровообращение", "гемодинамика", "тромбофлебит",
            "кровяные сгустки", "артериальный кровоток", "лимфоток", "ангиопатия",
        ]),
        KeywordGroup::new("liver", &[
            "печень", "гепатопротекторы", "желчь", "гепатит", "цирроз", "жировой гепатоз",
            "детоксикация печени", "ферменты печени", "холестаз", "печеночная недостаточность",
            "очищение печени", "желчегонные", "печеночный метаболизм",
        ]),
        KeywordGroup::new("reproductive", &[
            "репродуктивное здоровье", "фертильность", "менструация", "беременность", "либидо",
            "эректильная дисфункция", "простата", "яичники", "матка", "сперматогенез",
            "овуляция", "репродуктивная система", "бесплодие", "гормоны пола",
        ]),
        KeywordGroup::new("mental_health", &[
            "психическое здоровье", "депрессия", "тревожное расстройство",
            "эмоциональное состояние", "психоэмоциональный баланс", "апатия", "настроение",
            "биполярное расстройство", "психологическое благополучие", "антидепрессанты",
            "серотонин",
        ]),
        KeywordGroup::new("thyroid", &[
            "щитовидная железа", "тиреоидные гормоны", "гипотиреоз", "гипертиреоз", "зоб",
            "йод", "тироксин", "ттг", "аутоиммунный тиреоидит", "узлы щитовидки",
            "метаболизм щитовидки", "эндокринология",
        ]),
        KeywordGroup::new("kidneys", &[
            "почки", "мочевыделительная система", "почечная недостаточность",
            "мочекаменная болезнь", "пиелонефрит", "почечная фильтрация", "мочеиспускание",
            "уремия", "диуретики", "отечность", "почечные канальцы", "гломерулонефрит",
        ]),
        KeywordGroup::new("pain", &[
            "боль", "хроническая боль", "головная боль", "мигрень", "невралгия", "мышечная боль",
            "суставная боль", "болеутоляющее", "спазмолитическое", "боль в спине", "острая боль",
            "фибромиалгия", "боль в шее",
        ]),
        KeywordGroup::new("aging", &[
            "старение", "антивозрастной", "долголетие", "возрастные изменения", "антиоксиданты",
            "клеточное обновление", "морщины", "снижение тонуса", "возрастной метаболизм",
            "гериатрия", "оксидативный стресс", "теломеры",
        ]),
    ]
}

fn default_tag_groups() -> Vec<KeywordGroup> {
    vec![
        KeywordGroup::new("sleep", &["сон", "бессонница", "уснуть", "отдых", "расслабление"]),
        KeywordGroup::new("stress", &["стресс", "тревога", "напряжение", "нервы", "успокоение"]),
        KeywordGroup::new("energy", &["энергия", "бодрость", "усталость", "активность"]),
        KeywordGroup::new("immunity", &["иммунитет", "простуда", "вирусы", "иммунная система"]),
        KeywordGroup::new("skin", &["кожа", "акне", "увлажнение", "псориаз"]),
        KeywordGroup::new("vitamins", &["витамины", "витамин", "минералы", "микроэлементы"]),
        KeywordGroup::new("weight", &["вес", "похудение", "метаболизм"]),
        KeywordGroup::new("joints", &["суставы", "кости", "артрит", "гибкость"]),
        KeywordGroup::new("gut", &["жкт", "пищеварение", "желудок", "кишечник"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tables_are_lowercase() {
        for group in DEFAULT_TOPICS.keyword_groups() {
            for kw in &group.keywords {
                assert_eq!(kw, &kw.to_lowercase(), "group {}", group.name);
            }
        }
        assert!(DEFAULT_TOPICS
            .abbreviations()
            .iter()
            .all(|(short, _)| short == &short.to_lowercase()));
    }

    #[test]
    fn test_group_order_is_preserved() {
        let names: Vec<&str> = DEFAULT_TOPICS
            .keyword_groups()
            .iter()
            .map(|g| g.name.as_str())
            .collect();
        assert_eq!(names.first(), Some(&"heart"));
        assert_eq!(names.last(), Some(&"aging"));
        assert!(names.contains(&"immunity"));
    }

    #[test]
    fn test_custom_tables_are_normalized() {
        let topics = Topics::new(
            vec![("  ABC ".to_string(), "alpha beta".to_string())],
            vec![KeywordGroup {
                name: "x".to_string(),
                keywords: vec!["Foo".to_string(), String::new()],
            }],
            vec![],
        );
        assert_eq!(topics.abbreviations()[0].0, "abc");
        assert_eq!(topics.keyword_groups()[0].keywords, vec!["foo".to_string()]);
        assert!(topics.keyword_groups()[0].matches("some foo here"));
    }
}
