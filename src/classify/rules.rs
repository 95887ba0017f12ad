use crate::model::Category;

/// Category signal table. Order matters: equal scores resolve to the
/// earlier row. A trailing `*` turns the last word into a prefix match.
pub const CATEGORY_RULES: &[(Category, &[&str])] = &[
    (
        Category::Medicine,
        &[
            "medical",
            "medicine",
            "first aid",
            "dentist",
            "doctor",
            "health care",
            "preventive medicine",
            "wound closure",
            "war surgery",
            "wilderness medicine",
            "medicinal plants",
            "herbal",
            "nature cure",
            "anticancer",
            "healing pets",
            "pandemic",
            "influenza",
            "medical kit",
            "hospital",
        ],
    ),
    (
        Category::NuclearCbrn,
        &[
            "nuclear",
            "nbc",
            "cbrn",
            "radiation",
            "radiological",
            "fallout",
            "shelter design",
            "emp",
            "decontamination",
            "contamination",
            "nuclear war",
            "nuclear winter",
            "nuclear survival",
            "detonation",
        ],
    ),
    (
        Category::Survival,
        &[
            "survival manual",
            "survival guide",
            "survival skills",
            "wilderness survival",
            "bushcraft",
            "woodcraft",
            "camping",
            "boy scout",
            "backcountry",
            "outback",
            "woods",
            "evasion",
            "recovery",
            "cold weather",
            "winter survival",
            "worst case scenario",
            "survive doomsday",
            "surviving in the city",
            "urban survival",
            "combat survival",
            "mountaineering",
            "antarctic",
            "austere",
            "alpine",
            "debris hut",
            "flintknapping",
        ],
    ),
    (
        Category::WaterSanitation,
        &[
            "water purification",
            "water treatment",
            "sodis",
            "safe water",
            "hygiene",
            "sanitation",
            "field hygiene",
        ],
    ),
    (
        Category::Preparedness,
        &[
            "preparedness",
            "emergency plan",
            "bug out",
            "get home bag",
            "inch bag",
            "scare kit",
            "survival kit",
            "disaster supply",
            "crisis guide",
            "citizen preparedness",
            "self sufficient",
            "3 day emergency",
            "everyday carry",
            "car emergency",
            "bug out vehicle",
            "family supply",
            "home survival",
            "crisis",
            "be prepared",
            "basic emergency",
        ],
    ),
    (
        Category::Navigation,
        &[
            "map reading",
            "land navigation",
            "compass",
            "direction finding",
            "signaling",
            "radio monitoring",
            "phonetic alphabet",
            "find your way",
        ],
    ),
    (
        Category::Military,
        &[
            "fm 21 76",
            "fm 31 70",
            "fm 3 06",
            "fm 3 25",
            "fm 5 103",
            "fm 20 3",
            "fm 4 25",
            "stp 21",
            "tm 31 210",
            "ranger handbook",
            "army warrior",
            "military",
            "combatives",
            "martial arts",
            "kill or get killed",
            "guerrilla",
            "art of war",
            "camouflage",
            "concealment",
            "survivability",
            "urban operations",
            "improvised munitions",
            "close quarters combat",
            "hand to hand",
            "fieldcraft",
            "usmc",
            "marines",
            "self defense",
            "unarmed combat",
            "physical security",
        ],
    ),
    (
        Category::FoodAgriculture,
        &[
            "canning",
            "preserving",
            "food",
            "recipe*",
            "garden*",
            "farming",
            "agriculture",
            "mushroom*",
            "edible",
            "jerky",
            "dutch oven",
            "cooking",
            "dehydrat*",
            "drying",
            "ferment*",
            "pickl*",
            "game meat",
            "fish*",
            "trapping",
            "snare*",
            "deadfall*",
            "hunting",
            "foraging",
            "berry",
            "berries",
            "cookbook",
            "food storage",
            "soil",
            "composting",
            "greenhouse",
            "vegetable*",
            "tanning",
        ],
    ),
    (
        Category::ShelterConstruction,
        &[
            "shelter",
            "shelters",
            "shack",
            "shanties",
            "shelter building",
            "shelter construction",
            "fallout shelter",
            "family shelter",
        ],
    ),
    (
        Category::DiyRepair,
        &[
            "carpentry",
            "concrete",
            "masonry",
            "metal forming",
            "woodworking",
            "macgyver",
            "household cyclopedia",
            "home repair",
            "generator",
            "wood burning",
            "leather work",
            "foxfire",
            "black powder",
            "energy device",
        ],
    ),
    (
        Category::Reference,
        &[
            "checklist",
            "phonetic alphabet",
            "edibility test",
            "load chart",
            "knots",
            "rope",
            "lashing",
            "splices",
        ],
    ),
    (
        Category::Education,
        &["handbook", "encyclopedia", "manual", "guide", "training"],
    ),
];

pub const FALLBACK_CATEGORY: Category = Category::Education;

/// Signals that a document carries life-saving knowledge.
pub const LIFE_CRITICAL_TERMS: &[&str] = &[
    "where there is no doctor",
    "where there is no dentist",
    "first aid",
    "fm 21 76",
    "survival manual",
    "water purification",
    "water treatment",
    "nuclear war survival skills",
    "emergency plan",
    "citizen preparedness",
    "medical handbook",
    "survival and austere medicine",
    "wilderness medicine",
    "emergency war surgery",
    "wound closure",
    "field hygiene",
    "nuclear survival",
    "bug out bag",
    "survival kit",
    "fm 4 25",
    "preventive medicine",
    "special forces medical",
];

/// Practical skills worth keeping in the standard tier.
pub const PRACTICAL_TERMS: &[&str] = &[
    "cold weather",
    "canning",
    "preserving",
    "shelter",
    "map reading",
    "navigation",
    "compass",
    "preparedness manual",
    "ranger handbook",
    "edible",
    "trapping",
    "snare*",
    "bushcraft",
    "crisis guide",
    "food",
    "garden*",
    "camping",
    "self sufficient",
    "decontamination",
    "contamination",
    "protection",
    "fallout",
    "checklist",
    "knots",
    "deadfall*",
    "signals",
    "direction finding",
];

pub const COMPACT_REFERENCE_TERMS: &[&str] = &["checklist", "kit"];

pub const REFERENCE_VOLUME_TERMS: &[&str] = &["encyclopedia", "cyclopedia", "complete guide"];

pub const LOW_RELEVANCE_TERMS: &[&str] = &[
    "burning man",
    "dog bug out",
    "gift mix",
    "baby food",
    "healing pets",
    "anticancer",
    "stealing",
    "steal this book",
    "navy seal fitness",
    "boy scout cookbook",
    "dutch oven",
    "camping recipes",
    "native berry",
];

/// Overtly political or conspiracy framing. Matching entries stay in the
/// catalog as low relevance with an `excluded-content` review flag.
pub const EXCLUDED_CONTENT_TERMS: &[&str] = &[
    "new world order",
    "deep state",
    "globalist agenda",
    "illuminati",
    "government conspiracy",
    "one world government",
    "shadow government",
    "sovereign citizen",
    "political manifesto",
    "anarchist cookbook",
    "patriot movement",
    "militia movement",
    "insurrection",
    "government tyranny",
    "gun control",
    "second amendment",
    "great reset conspiracy",
    "martial law takeover",
    "wake up sheeple",
    "false flag",
    "crisis actor",
    "truth movement",
    "agenda 21",
    "agenda 2030 conspiracy",
    "fema camp",
    "depopulation agenda",
    "chemtrail*",
    "great replacement",
];

/// Topics looked for in extracted text when writing summaries.
pub const SUMMARY_TOPICS: &[&str] = &[
    "water",
    "fire",
    "shelter",
    "food",
    "navigation",
    "first aid",
    "signaling",
    "survival",
    "medical",
    "weapons",
    "trapping",
    "hunting",
    "fishing",
    "plants",
    "knots",
    "radio",
    "nuclear",
    "decontamination",
    "evacuation",
    "emergency",
    "wounds",
    "fractures",
    "burns",
    "cpr",
    "bleeding",
    "shock",
    "canning",
    "preserving",
    "garden",
    "seeds",
    "soil",
    "cold weather",
    "desert",
    "tropical",
    "sea survival",
    "urban",
    "evasion",
    "concealment",
    "camouflage",
];

/// Publisher cues searched in the leading extracted text.
pub const DOCUMENT_KINDS: &[(&str, &str)] = &[
    ("field manual", "U.S. military field manual"),
    ("department of the army", "U.S. Army publication"),
    ("marine corps", "U.S. Marine Corps publication"),
    ("usmc", "U.S. Marine Corps publication"),
    ("fema", "FEMA publication"),
];
